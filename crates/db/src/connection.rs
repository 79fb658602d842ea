use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use convoy_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

// Applied to every pooled connection. WAL keeps readers unblocked during the
// coordinator's write bursts; the busy timeout covers lock contention between
// the ingress path and the completion worker.
const CONNECTION_PRAGMAS: &[&str] =
    &["PRAGMA foreign_keys = ON", "PRAGMA journal_mode = WAL", "PRAGMA busy_timeout = 5000"];

pub async fn connect_from_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.connect_timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                for pragma in CONNECTION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use super::connect_with_settings;

    #[tokio::test]
    async fn pooled_connections_enforce_foreign_keys() {
        let pool =
            connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("pragma should be queryable");
        assert_eq!(enabled, 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn zero_sized_pools_are_clamped_to_one_connection() {
        let pool =
            connect_with_settings("sqlite::memory:", 0, 5).await.expect("pool should connect");

        let answer: i64 = sqlx::query_scalar("SELECT 41 + 1")
            .fetch_one(&pool)
            .await
            .expect("query should run on the clamped pool");
        assert_eq!(answer, 42);

        pool.close().await;
    }
}

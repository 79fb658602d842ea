//! Ingress API for the orchestration core.
//!
//! Endpoints:
//! - message intake (the per-message saga)
//! - conversation completion
//! - requirement follow-up conversations
//! - the pending human-review queue
//!
//! Failures map through `ApplicationError::into_interface`, so every error
//! body carries a user-safe message plus a correlation id for log lookup.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use convoy_core::{
    ApplicationError, CompletionOutcome, ConversationId, IncomingMessage, InterfaceError,
    ProcessingResult, RequirementConversationOutcome, RequirementId, ReviewRequest,
};
use convoy_db::repositories::ReviewRequestRepository;
use convoy_orchestrator::{ConversationCompletionWorkflow, ConversationTaskCoordinator};

use crate::bootstrap::Application;

const DEFAULT_REVIEW_PAGE: u32 = 20;
const MAX_REVIEW_PAGE: u32 = 100;

#[derive(Clone)]
pub struct ApiState {
    coordinator: Arc<ConversationTaskCoordinator>,
    completion: Arc<ConversationCompletionWorkflow>,
    reviews: Arc<dyn ReviewRequestRepository>,
}

impl ApiState {
    pub fn from_application(app: &Application) -> Self {
        Self {
            coordinator: app.coordinator.clone(),
            completion: app.completion.clone(),
            reviews: app.reviews.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub user_message: &'static str,
    pub correlation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PendingReviewsQuery {
    #[serde(default)]
    limit: Option<u32>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/messages", post(process_message))
        .route("/api/v1/conversations/{conversation_id}/complete", post(complete_conversation))
        .route(
            "/api/v1/requirements/{requirement_id}/conversation",
            post(open_requirement_conversation),
        )
        .route("/api/v1/reviews/pending", get(pending_reviews))
        .with_state(state)
}

fn application_error(
    error: ApplicationError,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!(
        event_name = "api_request_rejected",
        correlation_id = %interface.correlation_id(),
        status = %status,
        reason = %interface,
    );

    (
        status,
        Json(ApiError {
            error: interface.to_string(),
            user_message: interface.user_message(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

async fn process_message(
    State(state): State<ApiState>,
    Json(incoming): Json<IncomingMessage>,
) -> Result<Json<ProcessingResult>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let result = state
        .coordinator
        .process_customer_message(incoming)
        .await
        .map_err(|error| application_error(error, &correlation_id))?;
    Ok(Json(result))
}

async fn complete_conversation(
    Path(conversation_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<CompletionOutcome>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let outcome = state
        .completion
        .complete_conversation(&ConversationId(conversation_id))
        .await
        .map_err(|error| application_error(error, &correlation_id))?;
    Ok(Json(outcome))
}

async fn open_requirement_conversation(
    Path(requirement_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<RequirementConversationOutcome>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let outcome = state
        .coordinator
        .create_conversation_for_requirement(&RequirementId(requirement_id))
        .await
        .map_err(|error| application_error(error, &correlation_id))?;
    Ok(Json(outcome))
}

async fn pending_reviews(
    State(state): State<ApiState>,
    Query(query): Query<PendingReviewsQuery>,
) -> Result<Json<Vec<ReviewRequest>>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let limit = query.limit.unwrap_or(DEFAULT_REVIEW_PAGE).min(MAX_REVIEW_PAGE);
    let pending = state.reviews.list_pending(limit).await.map_err(|error| {
        application_error(ApplicationError::Persistence(error.to_string()), &correlation_id)
    })?;
    Ok(Json(pending))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::body::Body;
    use axum::extract::{Path, Query, State};
    use axum::http::{Request, StatusCode};
    use axum::Json;
    use convoy_core::config::{ConfigOverrides, LoadOptions};
    use convoy_core::{Channel, IncomingMessage, ProcessingStatus};
    use tower::ServiceExt;

    use crate::api::{
        complete_conversation, open_requirement_conversation, pending_reviews, process_message,
        router, ApiState, PendingReviewsQuery,
    };
    use crate::bootstrap::bootstrap;

    async fn api_state() -> ApiState {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                // Discard port: the agent tier declines, the static tier
                // answers, and no test needs a live agent service.
                agent_base_url: Some("http://127.0.0.1:9".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed");
        ApiState::from_application(&app)
    }

    fn incoming(customer_id: &str, content: &str) -> IncomingMessage {
        IncomingMessage {
            customer_id: customer_id.to_string(),
            content: content.to_string(),
            channel: Channel::Web,
            sender_id: customer_id.to_string(),
            mode: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn messages_endpoint_runs_the_saga_and_returns_the_outcome() {
        let state = api_state().await;

        let Json(result) =
            process_message(State(state), Json(incoming("cust-api-1", "无法登录，紧急")))
                .await
                .expect("urgent message should process");

        assert_eq!(result.status, ProcessingStatus::AutoHandled);
        assert_eq!(result.requirements_created.len(), 1);
        assert_eq!(result.tasks_created.len(), 1);
        assert!(!result.agent_suggestion.suggested_reply.is_empty());
    }

    #[tokio::test]
    async fn blank_messages_map_to_bad_request() {
        let state = api_state().await;

        let (status, Json(body)) = process_message(State(state), Json(incoming("cust-api-2", "   ")))
            .await
            .err()
            .expect("blank content should be rejected");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.user_message,
            "The request could not be processed. Check inputs and try again."
        );
        assert!(!body.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn completing_an_unknown_conversation_maps_to_not_found() {
        let state = api_state().await;

        let (status, Json(body)) =
            complete_conversation(Path("conv-missing".to_string()), State(state))
                .await
                .err()
                .expect("unknown conversation should not complete");

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.user_message, "The requested record does not exist.");
    }

    #[tokio::test]
    async fn pending_reviews_surface_escalated_conversations() {
        let state = api_state().await;

        let Json(result) =
            process_message(State(state.clone()), Json(incoming("cust-api-3", "今天天气不错")))
                .await
                .expect("smalltalk should process");
        assert_eq!(result.status, ProcessingStatus::NeedsReview);

        let Json(pending) =
            pending_reviews(State(state), Query(PendingReviewsQuery { limit: Some(50) }))
                .await
                .expect("listing should succeed");

        assert!(
            pending.iter().any(|review| review.conversation_id == result.conversation_id),
            "escalated conversation should appear in the pending queue",
        );
    }

    #[tokio::test]
    async fn requirement_conversation_endpoint_reuses_the_original_channel() {
        let state = api_state().await;

        let Json(result) =
            process_message(State(state.clone()), Json(incoming("cust-api-4", "无法登录，紧急")))
                .await
                .expect("urgent message should process");
        let requirement_id = result.requirements_created[0].clone();

        let Json(outcome) =
            open_requirement_conversation(Path(requirement_id.0.clone()), State(state))
                .await
                .expect("requirement conversation decision should succeed");

        assert_eq!(outcome.conversation_id.as_ref(), Some(&result.conversation_id));
        assert!(!outcome.needs_customer_communication);
        assert_eq!(outcome.reason, "需求来自对话，已有沟通渠道");
    }

    #[tokio::test]
    async fn router_wires_the_ingress_routes() {
        let state = api_state().await;
        let app = router(state);

        let body = serde_json::to_string(&incoming("cust-api-5", "希望可以批量导出报表"))
            .expect("serialize request body");
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .expect("request should build"),
            )
            .await
            .expect("router should answer");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/unknown")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("router should answer");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

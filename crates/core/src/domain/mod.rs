pub mod conversation;
pub mod knowledge;
pub mod problem;
pub mod processing;
pub mod quality;
pub mod requirement;
pub mod review;
pub mod task;

pub mod health;
pub mod models;
pub mod predict;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use models::list_models;
pub use predict::{predict, predict_proba};

use crate::models::AppState;
use axum::Router;

pub mod assignment_routes;
pub mod health_routes;
pub mod record_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", record_routes::router())
        .nest("/api/v1", assignment_routes::router())
        .merge(health_routes::router())
        .with_state(state)
}

//! HTTP route handlers.

pub mod query;
pub mod status;
pub mod upload;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// All public routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(upload::routes())
        .merge(query::routes())
        .merge(status::routes())
}

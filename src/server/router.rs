use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{ask, health, history};
use crate::state::AppState;

/// Creates the application router with all routes and middleware.
///
/// API routes are JSON; when the configured static directory exists it is
/// served for everything else (the front end).
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    let static_dir = state.settings.static_dir.clone();

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::get_status))
        .route("/api/ask", post(ask::ask))
        .route("/api/history", get(history::get_history))
        .route("/api/reset", post(history::reset))
        .with_state(state);

    if static_dir.is_dir() {
        app = app.fallback_service(ServeDir::new(static_dir));
    }

    app.layer(cors_layer).layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let allowed_origins = state
        .settings
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// Fixed API routes are matched first; every other path is a repository key
/// handled by [`handlers::dispatch`].
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new().route("/v1/health", get(handlers::health_check));

    let mut router = Router::new()
        .merge(api_routes)
        .fallback(handlers::dispatch);

    // When enabled, restrict this endpoint to the Prometheus scrapers at the network level.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

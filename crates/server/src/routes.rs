//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Capability discovery
        .route("/v1/capabilities", get(handlers::get_capabilities))
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        // Auth
        .route("/v1/auth/signup", post(handlers::signup))
        .route("/v1/auth/login", post(handlers::login))
        .route("/v1/auth/logout", post(handlers::logout))
        .route("/v1/auth/whoami", get(handlers::whoami))
        // Account
        .route(
            "/v1/users/me",
            get(handlers::get_me)
                .patch(handlers::update_me)
                .delete(handlers::delete_me),
        )
        // Documents
        .route(
            "/v1/documents",
            post(handlers::create_document).get(handlers::list_documents),
        )
        .route(
            "/v1/documents/{document_id}",
            get(handlers::get_document)
                .patch(handlers::update_document)
                .delete(handlers::delete_document),
        )
        // Folders
        .route(
            "/v1/documents/{document_id}/folders",
            put(handlers::create_folder),
        )
        .route(
            "/v1/documents/{document_id}/folders/{folder_name}",
            axum::routing::patch(handlers::rename_folder).delete(handlers::delete_folder),
        )
        // Resources
        .route(
            "/v1/documents/{document_id}/resources",
            post(handlers::attach_resource),
        )
        .route(
            "/v1/resources/{resource_id}",
            get(handlers::get_resource_meta)
                .patch(handlers::update_resource_meta)
                .delete(handlers::delete_resource),
        )
        .route(
            "/v1/resources/{resource_id}/content",
            get(handlers::get_resource_content),
        )
        .route(
            "/v1/resources/{resource_id}/content/raw",
            get(handlers::get_resource_content_raw),
        )
        .route(
            "/v1/resources/{resource_id}/move",
            post(handlers::move_resource),
        )
        // Admin endpoints (all require admin scope)
        .route("/v1/admin/users", get(handlers::list_users))
        .route("/v1/admin/sweep", post(handlers::run_sweep))
        .route("/v1/admin/stats", get(handlers::get_stats));

    let mut router = Router::new().merge(api_routes);

    // Conditionally add metrics endpoint based on config.
    // SECURITY: when enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    // See crate::metrics module documentation for details.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> Auth -> Handler
    router
        // Auth middleware (validates session and sets AuthenticatedUser extension)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Web application router and middleware setup.

use crate::monitor::SnapshotReceiver;
use crate::web::config::WebConfig;
use crate::web::handlers;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Create the axum application serving `/api/*` and the static dashboard.
pub fn create_app(config: &WebConfig, snapshots: SnapshotReceiver) -> Router {
    let mut app = Router::new()
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/health", get(handlers::health_check))
        .with_state(snapshots);

    match &config.static_dir {
        Some(static_dir) if static_dir.is_dir() => {
            info!("Serving static files from: {:?}", static_dir);
            // ServeDir maps "/" to index.html and rejects paths escaping the directory
            app = app.fallback_service(ServeDir::new(static_dir));
        }
        Some(static_dir) => {
            warn!("Static directory {:?} does not exist, serving API only", static_dir);
        }
        None => {}
    }

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::agent::{Scheduler, SessionRegistry};
use crate::api::state::AppState;
use crate::core::{AppConfig, init_tracing};

// How often idle sessions are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn app(shared_state: Arc<RwLock<AppState>>) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        // API routes
        .nest("/api", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(Arc::clone(&shared_state))
}

// Run the server
pub async fn serve(host: String, port: String, config: AppConfig) {
    // axum logs rejections from built-in extractors with the `axum::rejection`
    // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
    init_tracing(&format!(
        "{}=debug,tower_http=debug,axum::rejection=trace",
        env!("CARGO_CRATE_NAME")
    ));

    let scheduler = Arc::new(Scheduler::from_config(&config));
    let registry = Arc::new(SessionRegistry::new(scheduler, config.session_ttl));

    let app_state = AppState::new(config, Arc::clone(&registry));
    let shared_state = Arc::new(RwLock::new(app_state));
    let app = app(Arc::clone(&shared_state));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
        .await
        .unwrap();

    tracing::debug!(
        "Server started. Listening on {}",
        listener.local_addr().unwrap()
    );

    // Idle sessions are dropped in the background
    registry.spawn_expiry_sweep(SWEEP_INTERVAL);

    axum::serve(listener, app).await.unwrap();
}

//! MedRAG API - HTTP server
//!
//! Exposes the chat endpoint, health probes and the OpenAPI document.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use handlers::{chat, health};
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(title = "MedRAG API", description = "Medical question answering over an indexed reference book"),
    paths(
        chat::root,
        chat::chat,
        health::health_check,
        health::readiness_check,
    ),
    components(schemas(
        chat::StatusResponse,
        chat::ChatRequest,
        chat::ChatResponse,
        error::ErrorResponse,
        health::HealthResponse,
        health::ReadinessResponse,
    )),
    tags(
        (name = "chat", description = "Question answering"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// CORS for exactly one origin, mirroring request methods and headers
pub fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = match origin.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::list([value]),
        Err(_) => {
            tracing::warn!(origin, "Invalid CORS origin; cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/", get(chat::root))
        .route("/chat", post(chat::chat))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

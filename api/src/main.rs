use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod error;
mod extract;
mod llm;
mod middleware;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "NutriFit API",
        version = "0.1.0",
        description = "Webhook intake and voice tool-call fulfillment for the NutriFit coaching app."
    ),
    paths(
        routes::health::health_check,
        routes::webhooks::clerk_webhook,
        routes::programs::generate_program,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::programs::ToolCallResponse,
        routes::programs::ToolCallResult,
        nutrifit_core::error::ApiError,
        nutrifit_core::plan::WorkoutPlan,
        nutrifit_core::plan::WorkoutDay,
        nutrifit_core::plan::Routine,
        nutrifit_core::plan::DietPlan,
        nutrifit_core::plan::Meal,
        nutrifit_core::plan::NewPlan,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutrifit_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::Config::from_env().expect("configuration error");

    if config.webhook_secret.is_none() {
        tracing::warn!("CLERK_WEBHOOK_SECRET is not set; webhook intake will refuse deliveries");
    }
    if config.vapi_secret.is_none() {
        tracing::warn!("VAPI_SECRET is not set; tool-call authorization is DISABLED");
    }

    let store = Arc::new(store::HttpStore::new(
        config.store_url.clone(),
        config.store_api_key.clone(),
    ));
    let model = Arc::new(llm::GroqClient::new(
        config.groq_api_key.clone(),
        config.groq_model.clone(),
        config.groq_base_url.clone(),
    ));

    let app_state = state::AppState {
        config: Arc::new(config),
        store,
        model,
    };

    // HTTPS enforcement (only when NUTRIFIT_REQUIRE_HTTPS=true)
    let require_https = std::env::var("NUTRIFIT_REQUIRE_HTTPS")
        .map(|v| v == "true")
        .unwrap_or(false);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::webhooks::router().layer(middleware::rate_limit::webhooks_layer()))
        .merge(routes::programs::router().layer(middleware::rate_limit::programs_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .option_layer(
                    require_https
                        .then(|| axum::middleware::from_fn(middleware::https::require_https)),
                ),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("NutriFit API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

use axum::http::Response;
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

/// POST /webhooks/clerk: signups are low-volume; 30/minute per IP absorbs
/// the provider's retry bursts without letting a bad actor probe
/// signatures at speed.
pub fn webhooks_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(30)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for webhooks"),
    )
    .error_handler(json_error_handler)
}

/// POST /vapi/generate-program: every accepted call bills two model
/// completions, so the ceiling is deliberately low. 10/minute per IP.
pub fn programs_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for programs"),
    )
    .error_handler(json_error_handler)
}

/// Returns JSON in the ApiError shape with a Retry-After header.
fn json_error_handler(err: GovernorError) -> Response<axum::body::Body> {
    let (status, retry_after, message) = match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            wait_time.to_string(),
            format!("Too many requests. Retry after {wait_time} seconds."),
        ),
        GovernorError::UnableToExtractKey => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            String::new(),
            "Unable to determine client identity for rate limiting".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => {
            (code, String::new(), msg.unwrap_or_default().to_string())
        }
    };

    let request_id = uuid::Uuid::now_v7().to_string();
    let body = serde_json::json!({
        "error": nutrifit_core::error::codes::RATE_LIMITED,
        "message": message,
        "request_id": request_id,
    });

    let mut response = Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    if !retry_after.is_empty() {
        response
            .headers_mut()
            .insert("retry-after", retry_after.parse().unwrap());
    }

    response
}

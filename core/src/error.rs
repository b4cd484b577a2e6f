use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response. Both callers of this API are machines (the
/// voice platform's tool runner and operator tooling), so errors carry a
/// stable machine-readable code plus enough context to correct the request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "unauthorized")
    pub error: String,
    /// Human/agent-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const UPSTREAM_ERROR: &str = "upstream_error";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const RATE_LIMITED: &str = "rate_limited";
}

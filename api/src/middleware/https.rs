use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// HTTPS enforcement behind a TLS-terminating proxy.
///
/// The proxy records the original scheme in `X-Forwarded-Proto`; a missing
/// header means a direct (assumed secure) connection. Plain-http requests
/// get a permanent redirect rather than a rejection so misconfigured
/// webhook endpoints heal on retry, and every response carries HSTS.
pub async fn require_https(req: Request, next: Next) -> Response {
    let insecure = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|proto| proto == "http");

    let mut response = if insecure {
        match https_location(&req) {
            Some(location) => {
                (StatusCode::MOVED_PERMANENTLY, [("location", location)]).into_response()
            }
            None => next.run(req).await,
        }
    } else {
        next.run(req).await
    };

    response.headers_mut().insert(
        "strict-transport-security",
        HeaderValue::from_static("max-age=63072000; includeSubDomains"),
    );
    response
}

fn https_location(req: &Request) -> Option<String> {
    let host = req.headers().get("host")?.to_str().ok()?;
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Some(format!("https://{host}{path_and_query}"))
}

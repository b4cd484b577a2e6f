use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;

use nutrifit_core::webhook::{self, IdentityEvent, SignatureHeaders, WebhookVerifier};

use crate::state::AppState;
use crate::store::SyncUser;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/clerk", post(clerk_webhook))
}

/// Identity provider webhook intake.
///
/// Responses are status-only: the provider retries on 5xx, treats 4xx as
/// permanently rejected, and nothing about signature verification may leak
/// to an unauthenticated caller. Verification failure detail goes to the
/// logs instead.
#[utoipa::path(
    post,
    path = "/webhooks/clerk",
    request_body(content = String, description = "Raw Svix-signed event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event verified; processed or ignored"),
        (status = 400, description = "Missing signature headers, failed verification, or an invalid envelope"),
        (status = 500, description = "Signing secret unconfigured or user sync failed")
    ),
    tag = "webhooks"
)]
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(secret) = state.config.webhook_secret.as_deref() else {
        tracing::error!("CLERK_WEBHOOK_SECRET is not set; refusing webhook delivery");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };

    // Header presence is checked before any cryptographic work.
    let Some(sig_headers) = signature_headers(&headers) else {
        return StatusCode::BAD_REQUEST;
    };

    let verifier = match WebhookVerifier::new(secret) {
        Ok(verifier) => verifier,
        Err(err) => {
            tracing::error!(error = %err, "webhook signing secret is malformed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if let Err(err) = verifier.verify(&body, &sig_headers) {
        tracing::warn!(error = %err, svix_id = sig_headers.id, "webhook signature rejected");
        return StatusCode::BAD_REQUEST;
    }

    let event = match webhook::parse_event(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, svix_id = sig_headers.id, "webhook envelope rejected");
            return StatusCode::BAD_REQUEST;
        }
    };

    match event {
        IdentityEvent::UserCreated { data } => {
            // An account with no email entry violates the sender's own
            // contract for user.created; reject instead of syncing a blank.
            let Some(email) = data.primary_email() else {
                tracing::warn!(clerk_id = %data.id, "user.created carried no email addresses");
                return StatusCode::BAD_REQUEST;
            };

            let user = SyncUser {
                email: email.to_string(),
                name: data.display_name(),
                image: data.image_url.clone(),
                clerk_id: data.id.clone(),
            };

            // A sync failure must surface as 5xx so the provider retries;
            // answering 200 here would silently lose the signup.
            if let Err(err) = state.store.sync_user(user).await {
                tracing::error!(error = %err, clerk_id = %data.id, "user sync failed");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }

            tracing::info!(clerk_id = %data.id, "user synced from signup webhook");
            StatusCode::OK
        }
        IdentityEvent::Unrecognized => StatusCode::OK,
    }
}

fn signature_headers(headers: &HeaderMap) -> Option<SignatureHeaders<'_>> {
    let get = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    Some(SignatureHeaders {
        id: get(webhook::HEADER_ID)?,
        timestamp: get(webhook::HEADER_TIMESTAMP)?,
        signature: get(webhook::HEADER_SIGNATURE)?,
    })
}

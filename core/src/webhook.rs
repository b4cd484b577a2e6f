use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signed timestamps further than this from the receiver's clock are
/// rejected, limiting the replay window.
const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

/// The three transport headers the provider signs with. All of them must
/// be present before any cryptographic work happens.
pub const HEADER_ID: &str = "svix-id";
pub const HEADER_TIMESTAMP: &str = "svix-timestamp";
pub const HEADER_SIGNATURE: &str = "svix-signature";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("signing secret is not a valid whsec_ key")]
    BadSecret,
    #[error("signature timestamp is malformed")]
    BadTimestamp,
    #[error("signature timestamp outside the tolerance window")]
    StaleTimestamp,
    #[error("no signature candidate matched the payload")]
    SignatureMismatch,
    #[error("event envelope is not valid JSON: {0}")]
    BadEnvelope(#[from] serde_json::Error),
}

/// Verification context taken from the request headers.
#[derive(Debug, Clone, Copy)]
pub struct SignatureHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

/// Verifies the provider's webhook signature scheme: HMAC-SHA256 over
/// `{id}.{timestamp}.{body}` with a base64 `whsec_` key, carried as
/// space-separated `v1,<base64>` candidates in the signature header.
pub struct WebhookVerifier {
    key: Vec<u8>,
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, WebhookError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64.decode(encoded).map_err(|_| WebhookError::BadSecret)?;
        if key.is_empty() {
            return Err(WebhookError::BadSecret);
        }
        Ok(Self { key })
    }

    /// Produce the `v1,<base64>` signature for a payload. Used by tests and
    /// by outbound tooling that replays events at a local deployment.
    pub fn sign(&self, id: &str, timestamp: i64, payload: &[u8]) -> String {
        let mac = self.mac(id, timestamp, payload);
        format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Verify a payload against its signature headers at the current time.
    pub fn verify(&self, payload: &[u8], headers: &SignatureHeaders<'_>) -> Result<(), WebhookError> {
        self.verify_at(payload, headers, Utc::now())
    }

    /// Verification is a pure function of body, headers, secret, and clock;
    /// tests pin the clock through this entry point.
    pub fn verify_at(
        &self,
        payload: &[u8],
        headers: &SignatureHeaders<'_>,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let timestamp: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| WebhookError::BadTimestamp)?;

        if (now.timestamp() - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
            return Err(WebhookError::StaleTimestamp);
        }

        // The header may carry several candidates (key rotation); any match
        // verifies. Comparison goes through the MAC so it stays constant-time.
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|candidate| candidate.strip_prefix("v1,"))
            .filter_map(|encoded| BASE64.decode(encoded).ok())
            .any(|candidate| {
                self.mac(headers.id, timestamp, payload)
                    .verify_slice(&candidate)
                    .is_ok()
            });

        if matched {
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }

    fn mac(&self, id: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

/// The identity provider's event envelope, tagged by `type`. Only signup
/// events carry behavior here; everything else is acknowledged and ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum IdentityEvent {
    #[serde(rename = "user.created")]
    UserCreated { data: NewUser },
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// External identity id, the stable key the store upserts by
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailEntry {
    pub email_address: String,
}

impl NewUser {
    /// First address on the account. The provider sends at least one for
    /// `user.created`, but the envelope does not guarantee it.
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .first()
            .map(|entry| entry.email_address.as_str())
    }

    /// Trimmed `first last` concat; empty when the account has no name.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Decode a verified payload into its typed event.
pub fn parse_event(payload: &[u8]) -> Result<IdentityEvent, WebhookError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use chrono::TimeZone;

    fn verifier() -> WebhookVerifier {
        let secret = format!(
            "whsec_{}",
            base64::engine::general_purpose::STANDARD.encode(b"test-signing-key")
        );
        WebhookVerifier::new(&secret).expect("valid secret")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sign_then_verify_roundtrips() {
        let v = verifier();
        let body = br#"{"type":"user.created","data":{"id":"user_1"}}"#;
        let ts = now().timestamp();
        let signature = v.sign("msg_1", ts, body);
        let headers = SignatureHeaders {
            id: "msg_1",
            timestamp: &ts.to_string(),
            signature: &signature,
        };
        assert!(v.verify_at(body, &headers, now()).is_ok());
    }

    #[test]
    fn single_byte_tamper_invalidates() {
        let v = verifier();
        let body = br#"{"type":"user.created","data":{"id":"user_1"}}"#.to_vec();
        let ts = now().timestamp();
        let signature = v.sign("msg_1", ts, &body);

        let mut tampered = body.clone();
        tampered[10] ^= 0x01;

        let headers = SignatureHeaders {
            id: "msg_1",
            timestamp: &ts.to_string(),
            signature: &signature,
        };
        assert!(matches!(
            v.verify_at(&tampered, &headers, now()),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn header_id_is_part_of_the_signed_content() {
        let v = verifier();
        let body = b"{}";
        let ts = now().timestamp();
        let signature = v.sign("msg_1", ts, body);
        let headers = SignatureHeaders {
            id: "msg_2",
            timestamp: &ts.to_string(),
            signature: &signature,
        };
        assert!(v.verify_at(body, &headers, now()).is_err());
    }

    #[test]
    fn any_matching_candidate_verifies() {
        let v = verifier();
        let body = b"{}";
        let ts = now().timestamp();
        let good = v.sign("msg_1", ts, body);
        let combined = format!("v1,AAAA v2,ignored {good}");
        let headers = SignatureHeaders {
            id: "msg_1",
            timestamp: &ts.to_string(),
            signature: &combined,
        };
        assert!(v.verify_at(body, &headers, now()).is_ok());
    }

    #[test]
    fn stale_timestamp_is_rejected_even_with_a_valid_signature() {
        let v = verifier();
        let body = b"{}";
        let ts = now().timestamp() - TIMESTAMP_TOLERANCE_SECS - 1;
        let signature = v.sign("msg_1", ts, body);
        let headers = SignatureHeaders {
            id: "msg_1",
            timestamp: &ts.to_string(),
            signature: &signature,
        };
        assert!(matches!(
            v.verify_at(body, &headers, now()),
            Err(WebhookError::StaleTimestamp)
        ));
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        let v = verifier();
        let headers = SignatureHeaders {
            id: "msg_1",
            timestamp: "yesterday",
            signature: "v1,AAAA",
        };
        assert!(matches!(
            v.verify_at(b"{}", &headers, now()),
            Err(WebhookError::BadTimestamp)
        ));
    }

    #[test]
    fn bad_secret_material_is_rejected_at_construction() {
        assert!(matches!(
            WebhookVerifier::new("whsec_not-base64!!"),
            Err(WebhookError::BadSecret)
        ));
        assert!(matches!(
            WebhookVerifier::new("whsec_"),
            Err(WebhookError::BadSecret)
        ));
    }

    #[test]
    fn parses_user_created_envelope() {
        let payload = br#"{
            "type": "user.created",
            "data": {
                "id": "user_abc",
                "first_name": "Ada",
                "last_name": null,
                "image_url": "https://img.example/a.png",
                "email_addresses": [{"email_address": "ada@example.com", "id": "idn_1"}]
            },
            "object": "event"
        }"#;
        match parse_event(payload).expect("parses") {
            IdentityEvent::UserCreated { data } => {
                assert_eq!(data.id, "user_abc");
                assert_eq!(data.primary_email(), Some("ada@example.com"));
                assert_eq!(data.display_name(), "Ada");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_parse_as_unrecognized() {
        let payload = br#"{"type": "session.ended", "data": {"id": "sess_1"}}"#;
        assert!(matches!(
            parse_event(payload).expect("parses"),
            IdentityEvent::Unrecognized
        ));
    }

    #[test]
    fn display_name_handles_missing_parts() {
        let user = NewUser {
            id: "user_1".to_string(),
            first_name: None,
            last_name: Some("Lovelace".to_string()),
            image_url: None,
            email_addresses: Vec::new(),
        };
        assert_eq!(user.display_name(), "Lovelace");
        assert_eq!(user.primary_email(), None);
    }
}

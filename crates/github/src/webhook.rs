use std::{fmt::Display, sync::Arc};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Request},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use gha_annotations_core::config::Config;
use hmac::{Hmac, Mac};
use octocrab::models::webhook_events::WebhookEvent;
use sha2::Sha256;

pub const EVENT_TYPE_HEADER: &str = "X-GitHub-Event";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Verify and extract GitHub Event Payload.
///
/// Rejects with `401 Unauthorized` when the signature does not match the configured
/// webhook secret, and with `400 Bad Request` when the envelope cannot be parsed.
#[derive(Clone)]
#[must_use]
pub struct GitHubEvent {
    pub event: WebhookEvent,
}

fn reject(status: StatusCode, m: impl Display) -> Response {
    tracing::error!("{m}");
    (status, m.to_string()).into_response()
}

/// Check `sha256=<hex>` against the HMAC-SHA256 of `body`.
pub fn verify_signature(
    secret: &[u8],
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), &'static str> {
    let signature_sha256 = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or("X-Hub-Signature-256 missing")?
        .strip_prefix("sha256=")
        .ok_or("X-Hub-Signature-256 sha256= prefix missing")?;
    let signature = hex::decode(signature_sha256).map_err(|_| "X-Hub-Signature-256 malformed")?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| "invalid webhook secret")?;
    mac.update(body);
    mac.verify_slice(&signature).map_err(|_| "signature mismatch")
}

impl<S> FromRequest<S> for GitHubEvent
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync + Clone,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let config = <Arc<Config>>::from_ref(state);
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| reject(StatusCode::BAD_REQUEST, "error reading body"))?;
        if let Some(secret) = &config.server.webhook_secret {
            verify_signature(secret.as_bytes(), &headers, &body)
                .map_err(|m| reject(StatusCode::UNAUTHORIZED, m))?;
        }
        let event = headers
            .get(EVENT_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "X-GitHub-Event header missing"))?;
        let value = WebhookEvent::try_from_header_and_body(event, &body)
            .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("error parsing body: {e}")))?;
        Ok(GitHubEvent { event: value })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn sign(secret: &[u8], body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn headers(signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        headers
    }

    #[test]
    fn test_verify_signature() {
        let body = br#"{"action":"completed"}"#;
        let signature = sign(b"secret", body);
        assert_eq!(verify_signature(b"secret", &headers(&signature), body), Ok(()));
        assert_eq!(
            verify_signature(b"other", &headers(&signature), body),
            Err("signature mismatch")
        );
        assert_eq!(
            verify_signature(b"secret", &headers(&signature), b"{}"),
            Err("signature mismatch")
        );
    }

    #[test]
    fn test_verify_signature_malformed() {
        let body = b"{}";
        assert_eq!(
            verify_signature(b"secret", &HeaderMap::new(), body),
            Err("X-Hub-Signature-256 missing")
        );
        assert_eq!(
            verify_signature(b"secret", &headers("sha1=abcd"), body),
            Err("X-Hub-Signature-256 sha256= prefix missing")
        );
        assert_eq!(
            verify_signature(b"secret", &headers("sha256=zz"), body),
            Err("X-Hub-Signature-256 malformed")
        );
    }
}

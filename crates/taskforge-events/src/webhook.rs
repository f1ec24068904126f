//! Webhook ingestion (spec §4.10). No HTTP router lives in this crate — a
//! caller's own server extracts headers/body and hands them here.
//! HMAC-SHA256 over the raw body against an
//! `x-hub-signature-256: sha256=<hex>` header, or a static bearer token,
//! with signature mismatches reported as `Unauthorized`.

use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAuthMode {
    HmacSha256,
    BearerToken,
    None,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookAuthError {
    #[error("missing x-hub-signature-256 header")]
    MissingSignatureHeader,
    #[error("malformed x-hub-signature-256 header")]
    MalformedSignatureHeader,
    #[error("signature is not valid hex")]
    InvalidHex,
    #[error("invalid HMAC key length")]
    InvalidKeyLength,
    #[error("HMAC signature mismatch")]
    SignatureMismatch,
    #[error("missing authorization header")]
    MissingAuthHeader,
    #[error("authorization header must use Bearer scheme")]
    NotBearerScheme,
    #[error("bearer token mismatch")]
    TokenMismatch,
}

/// Verifies `GET /webhooks/:source`-style auth. Returns `Ok(())` on a passing
/// check (or `WebhookAuthMode::None`); the caller maps `Err` to a 401.
pub fn verify(mode: WebhookAuthMode, secret: &str, signature_header: Option<&str>, body: &[u8]) -> Result<(), WebhookAuthError> {
    match mode {
        WebhookAuthMode::None => Ok(()),
        WebhookAuthMode::HmacSha256 => verify_hmac_sha256(secret, signature_header, body),
        WebhookAuthMode::BearerToken => verify_bearer_token(secret, signature_header),
    }
}

fn verify_hmac_sha256(secret: &str, signature_header: Option<&str>, body: &[u8]) -> Result<(), WebhookAuthError> {
    let header = signature_header.ok_or(WebhookAuthError::MissingSignatureHeader)?;
    let sig_hex = header.strip_prefix("sha256=").ok_or(WebhookAuthError::MalformedSignatureHeader)?;
    let expected = hex::decode(sig_hex).map_err(|_| WebhookAuthError::InvalidHex)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookAuthError::InvalidKeyLength)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| WebhookAuthError::SignatureMismatch)
}

fn verify_bearer_token(secret: &str, auth_header: Option<&str>) -> Result<(), WebhookAuthError> {
    let header = auth_header.ok_or(WebhookAuthError::MissingAuthHeader)?;
    let token = header.strip_prefix("Bearer ").ok_or(WebhookAuthError::NotBearerScheme)?;
    if token == secret {
        Ok(())
    } else {
        Err(WebhookAuthError::TokenMismatch)
    }
}

/// Turns a raw webhook body into an [`EventPayload`]. JSON bodies are parsed
/// as-is; non-JSON bodies are carried through as a `"raw"` string field.
pub fn to_event_payload(source: &str, body: &[u8]) -> taskforge_core::types::EventPayload {
    let data = match serde_json::from_slice::<Value>(body) {
        Ok(v) => v,
        Err(_) => json!({"raw": String::from_utf8_lossy(body).to_string()}),
    };
    taskforge_core::types::EventPayload {
        source: format!("webhook:{source}"),
        summary: format!("webhook received from {source}"),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_hmac_signature_passes() {
        let body = br#"{"ping":"pong"}"#;
        let sig = sign("s3cr3t", body);
        assert!(verify(WebhookAuthMode::HmacSha256, "s3cr3t", Some(&sig), body).is_ok());
    }

    #[test]
    fn tampered_body_fails_hmac() {
        let body = br#"{"ping":"pong"}"#;
        let sig = sign("s3cr3t", body);
        let tampered = br#"{"ping":"PWNED"}"#;
        assert!(matches!(
            verify(WebhookAuthMode::HmacSha256, "s3cr3t", Some(&sig), tampered),
            Err(WebhookAuthError::SignatureMismatch)
        ));
    }

    #[test]
    fn bearer_token_mismatch_is_rejected() {
        let result = verify(WebhookAuthMode::BearerToken, "expected", Some("Bearer wrong"), b"{}");
        assert!(matches!(result, Err(WebhookAuthError::TokenMismatch)));
    }

    #[test]
    fn non_json_body_is_carried_as_raw() {
        let payload = to_event_payload("custom", b"plain text");
        assert_eq!(payload.data["raw"], "plain text");
    }
}

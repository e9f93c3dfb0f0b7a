//! Admin API-key extraction and webhook signature verification.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use base64::decode;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{config::ServerConfig, errors::ServerError};

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Extractor guarding the admin routes: the request must carry the configured API key in
/// `x-api-key`. An empty configured key disables the admin surface rather than leaving it
/// open.
pub struct AdminKey;

impl FromRequest for AdminKey {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let configured = req
            .app_data::<web::Data<ServerConfig>>()
            .map(|c| c.admin_api_key.reveal().clone())
            .unwrap_or_default();
        let provided = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        let authorized = !configured.is_empty() && provided == Some(configured.as_str());
        if authorized {
            ready(Ok(AdminKey))
        } else {
            ready(Err(ServerError::Unauthorized))
        }
    }
}

/// Checks the provider's HMAC-SHA256 signature (base64, over the raw body) against the
/// configured webhook secret. No-op when signature checks are disabled in config.
pub fn verify_webhook_signature(
    config: &ServerConfig,
    req: &HttpRequest,
    body: &[u8],
) -> Result<(), ServerError> {
    if !config.verify_webhook_signatures {
        return Ok(());
    }
    let signature = req
        .headers()
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::InvalidWebhookSignature)?;
    let expected = decode(signature).map_err(|_| ServerError::InvalidWebhookSignature)?;
    let mut mac = HmacSha256::new_from_slice(config.webhook_secret.reveal().as_bytes())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| ServerError::InvalidWebhookSignature)
}

#[cfg(test)]
mod test {
    use base64::encode;
    use commerce_common::Secret;

    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        encode(mac.finalize().into_bytes())
    }

    fn config_with_secret(secret: &str) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.webhook_secret = Secret::new(secret.to_string());
        config
    }

    #[test]
    fn valid_signature_passes() {
        let config = config_with_secret("hush");
        let body = br#"{"intent_id":"pi-1","outcome":"success"}"#;
        let req = actix_web::test::TestRequest::default()
            .insert_header((WEBHOOK_SIGNATURE_HEADER, sign("hush", body)))
            .to_http_request();
        assert!(verify_webhook_signature(&config, &req, body).is_ok());
    }

    #[test]
    fn bad_signature_is_rejected() {
        let config = config_with_secret("hush");
        let body = br#"{"intent_id":"pi-1","outcome":"success"}"#;
        let req = actix_web::test::TestRequest::default()
            .insert_header((WEBHOOK_SIGNATURE_HEADER, sign("wrong-secret", body)))
            .to_http_request();
        assert!(verify_webhook_signature(&config, &req, body).is_err());
    }

    #[test]
    fn missing_signature_is_rejected_unless_disabled() {
        let mut config = config_with_secret("hush");
        let req = actix_web::test::TestRequest::default().to_http_request();
        assert!(verify_webhook_signature(&config, &req, b"{}").is_err());

        config.verify_webhook_signatures = false;
        assert!(verify_webhook_signature(&config, &req, b"{}").is_ok());
    }
}

//! Signed provider notifications.
//!
//! The signature header has the form `t=<unix seconds>,v1=<hex digest>`,
//! where the digest is HMAC-SHA256 over `"{t}.{raw body}"` keyed with the
//! shared webhook secret. More than one `v1` entry may be present while the
//! secret is being rotated; any one of them matching is enough.

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: NotificationData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    pub object: SessionObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionObject {
    /// The checkout session id, i.e. the purchase's correlation id.
    pub id: String,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ProviderNotification {
    pub fn is_checkout_completed(&self) -> bool {
        self.kind == CHECKOUT_COMPLETED
    }

    pub fn session(&self) -> &SessionObject {
        &self.data.object
    }
}

/// Authenticates raw notification bodies against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies the signature and only then parses the body.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<ProviderNotification> {
        self.verify_at(payload, signature_header, Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<ProviderNotification> {
        let header = SignatureHeader::parse(signature_header)?;

        let skew = now
            .checked_sub(header.timestamp)
            .and_then(i64::checked_abs);
        if skew.is_none_or(|skew| skew > self.tolerance_secs) {
            return Err(PaymentError::Verification(
                "timestamp outside the tolerance window".into(),
            ));
        }

        let mac = self.mac(header.timestamp, payload)?;
        let matched = header.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(PaymentError::Verification(
                "no signature matches the payload".into(),
            ));
        }

        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::Verification(format!("malformed notification: {e}")))
    }

    /// Produces a header value for `payload`, as the provider would.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let digest = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Verification(format!("invalid webhook secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        PaymentError::Verification(format!("bad timestamp '{value}'"))
                    })?;
                    timestamp = Some(parsed);
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::Verification("signature header has no timestamp".into()))?;
        if signatures.is_empty() {
            return Err(PaymentError::Verification(
                "signature header has no v1 signature".into(),
            ));
        }
        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

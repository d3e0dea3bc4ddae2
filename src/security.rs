// src/security.rs
//! Shared-secret authentication for internal callers.
//!
//! Keys are compared as SHA-256 digests with a branch-free fold, so the
//! comparison time depends on neither key length nor the first differing byte.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sha2::{Digest, Sha256};

pub const API_KEY_HEADER: &str = "X-Internal-API-Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    Accepted,
    NotConfigured,
    Missing,
    Invalid,
}

/// The configured key, kept only as a digest.
#[derive(Clone)]
pub struct ApiKey {
    digest: Option<[u8; 32]>,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("configured", &self.digest.is_some())
            .finish()
    }
}

fn digest(s: &str) -> [u8; 32] {
    Sha256::digest(s.as_bytes()).into()
}

fn ct_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl ApiKey {
    pub fn new(key: Option<&str>) -> Self {
        Self {
            digest: key.filter(|k| !k.is_empty()).map(digest),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.digest.is_some()
    }

    pub fn check(&self, presented: Option<&str>) -> KeyCheck {
        let Some(expected) = &self.digest else {
            return KeyCheck::NotConfigured;
        };
        match presented {
            None | Some("") => KeyCheck::Missing,
            Some(k) if ct_eq(expected, &digest(k)) => KeyCheck::Accepted,
            Some(_) => KeyCheck::Invalid,
        }
    }
}

/// Axum middleware guarding internal routes.
pub async fn require_api_key(State(key): State<ApiKey>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let (status, detail) = match key.check(presented) {
        KeyCheck::Accepted => return next.run(req).await,
        KeyCheck::NotConfigured => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "API Key not configured on the server.",
        ),
        KeyCheck::Missing => (StatusCode::UNAUTHORIZED, "Missing API Key."),
        KeyCheck::Invalid => (StatusCode::UNAUTHORIZED, "Invalid or expired API Key."),
    };
    tracing::warn!(status = status.as_u16(), path = %req.uri().path(), "rejected request");
    (status, Json(json!({ "detail": detail }))).into_response()
}

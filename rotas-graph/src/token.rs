//! OAuth2 client-credentials token cache.
//!
//! One [`TokenProvider`] owns the process's single cached token. The cache is
//! held under a mutex for the whole read-check-fetch-store sequence, so two
//! callers racing on an expired token produce one token request, not two.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

use crate::config::{GraphConfig, GRAPH_SCOPE};
use crate::error::{GraphError, HttpFailure};
use crate::transport::HttpTransport;

/// Safety margin subtracted from the provider's `expires_in`.
pub const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub bearer: String,
    /// Already includes the skew: the token is usable strictly before this instant.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
}

pub struct TokenProvider {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(config: &GraphConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cache: Mutex::new(None),
        }
    }

    /// Return the cached token, or acquire a fresh one.
    pub fn token(&self) -> Result<AccessToken, GraphError> {
        self.token_at(Utc::now())
    }

    /// [`token`](Self::token) with an explicit clock.
    ///
    /// Failures are never retried here; the caller decides whether to rerun
    /// the whole pipeline.
    pub fn token_at(&self, now: DateTime<Utc>) -> Result<AccessToken, GraphError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cache.as_ref().filter(|t| t.is_valid_at(now)) {
            return Ok(token.clone());
        }
        *cache = None;

        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
        ];
        let payload = self
            .transport
            .post_form(&self.endpoint, &form)
            .map_err(|failure| {
                tracing::error!(
                    status = ?failure.status(),
                    diagnostic = %failure,
                    "token request rejected",
                );
                GraphError::Auth(failure)
            })?;

        let response: TokenResponse = serde_json::from_value(payload)
            .map_err(|e| GraphError::Auth(HttpFailure::Decode(e.to_string())))?;
        if let Some(kind) = response.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                tracing::warn!(token_type = kind, "unexpected token type");
            }
        }

        let expires_at = expiry(now, response.expires_in).ok_or_else(|| {
            tracing::error!(expires_in = response.expires_in, "token lifetime out of range");
            GraphError::Auth(HttpFailure::Decode(format!(
                "expires_in {} is out of range",
                response.expires_in
            )))
        })?;
        let token = AccessToken {
            bearer: response.access_token,
            expires_at,
        };
        tracing::debug!(expires_at = %token.expires_at, "acquired access token");
        *cache = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call reacquires.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn cached(&self) -> Option<AccessToken> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// `now + expires_in - skew`, or `None` when that instant is not representable.
fn expiry(now: DateTime<Utc>, expires_in: i64) -> Option<DateTime<Utc>> {
    let lifetime = TimeDelta::try_seconds(expires_in.checked_sub(EXPIRY_SKEW_SECS)?)?;
    now.checked_add_signed(lifetime)
}

//! Blocking HTTP seam over `ureq`.
//!
//! Everything that talks to the identity provider or Graph goes through
//! [`HttpTransport`], so tests can script responses without a network. The
//! production [`UreqTransport`] shares one agent with a fixed per-call timeout.

use std::time::Duration;

use serde_json::Value;

use crate::error::HttpFailure;

/// Per-call timeout for every external request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub trait HttpTransport: Send + Sync {
    /// `GET url` with a bearer token, decoding a JSON body.
    fn get_json(&self, url: &str, bearer: &str) -> Result<Value, HttpFailure>;

    /// `POST url` with a bearer token and a JSON body.
    fn post_json(&self, url: &str, bearer: &str, body: &Value) -> Result<Value, HttpFailure>;

    /// `POST url` with an `application/x-www-form-urlencoded` body, unauthenticated.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value, HttpFailure>;
}

#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(HTTP_TIMEOUT)
    }
}

impl HttpTransport for UreqTransport {
    fn get_json(&self, url: &str, bearer: &str) -> Result<Value, HttpFailure> {
        tracing::debug!(url, "GET");
        let response = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {bearer}"))
            .set("Accept", "application/json")
            .call();
        decode(response)
    }

    fn post_json(&self, url: &str, bearer: &str, body: &Value) -> Result<Value, HttpFailure> {
        tracing::debug!(url, "POST json");
        let response = self
            .agent
            .post(url)
            .set("Authorization", &format!("Bearer {bearer}"))
            .set("Accept", "application/json")
            .send_json(body.clone());
        decode(response)
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value, HttpFailure> {
        tracing::debug!(url, "POST form");
        decode(self.agent.post(url).send_form(form))
    }
}

fn decode(result: Result<ureq::Response, ureq::Error>) -> Result<Value, HttpFailure> {
    match result {
        Ok(response) => {
            let text = response
                .into_string()
                .map_err(|e| HttpFailure::Transport(e.to_string()))?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| HttpFailure::Decode(e.to_string()))
        }
        Err(ureq::Error::Status(status, response)) => Err(HttpFailure::Status {
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(transport)) => Err(HttpFailure::Transport(transport.to_string())),
    }
}

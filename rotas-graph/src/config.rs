//! Environment configuration for the Graph pipeline.
//!
//! All five identity/location variables are required; a missing one is a
//! startup error, never something retried at runtime.

use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::HTTP_TIMEOUT;

pub const ENV_TENANT_ID: &str = "ROTAS_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "ROTAS_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ROTAS_CLIENT_SECRET";
pub const ENV_SITE_NAME: &str = "ROTAS_SITE_NAME";
pub const ENV_FILE_PATH: &str = "ROTAS_FILE_PATH";
pub const ENV_GRAPH_BASE: &str = "ROTAS_GRAPH_BASE";
pub const ENV_LOGIN_BASE: &str = "ROTAS_LOGIN_BASE";

pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_LOGIN_BASE: &str = "https://login.microsoftonline.com";
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_name: String,
    /// Server-relative path inside the default drive, e.g. `/General/ROTAS/Gestão SST.xlsm`.
    pub file_path: String,
    pub graph_base: String,
    pub login_base: String,
    pub timeout: Duration,
}

// Hand-written so the secret never reaches a log line.
impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("site_name", &self.site_name)
            .field("file_path", &self.file_path)
            .field("graph_base", &self.graph_base)
            .field("login_base", &self.login_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GraphConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let tenant_id = required(ENV_TENANT_ID)?;
        let client_id = required(ENV_CLIENT_ID)?;
        let client_secret = required(ENV_CLIENT_SECRET)?;
        let site_name = required(ENV_SITE_NAME)?;
        let file_path = required(ENV_FILE_PATH)?;
        let file_path = if file_path.starts_with('/') {
            file_path
        } else {
            format!("/{file_path}")
        };

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            site_name,
            file_path,
            graph_base: base_url(lookup(ENV_GRAPH_BASE), DEFAULT_GRAPH_BASE, ENV_GRAPH_BASE)?,
            login_base: base_url(lookup(ENV_LOGIN_BASE), DEFAULT_LOGIN_BASE, ENV_LOGIN_BASE)?,
            timeout: HTTP_TIMEOUT,
        })
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.login_base, self.tenant_id)
    }
}

fn base_url(
    value: Option<String>,
    default: &str,
    var: &'static str,
) -> Result<String, ConfigError> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string());
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("'{value}' is not an http(s) URL"),
        });
    }
    Ok(value.trim_end_matches('/').to_string())
}

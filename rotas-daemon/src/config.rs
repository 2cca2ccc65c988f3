//! Daemon settings: Graph configuration plus the pull interval.

use std::time::Duration;

use rotas_graph::{ConfigError, GraphConfig};
use rotas_sync::DEFAULT_SYNC_INTERVAL_SECS;

pub const ENV_SYNC_INTERVAL_SECS: &str = "ROTAS_SYNC_INTERVAL_SECS";
pub const ENV_LOG_FORMAT: &str = "ROTAS_LOG_FORMAT";

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub graph: GraphConfig,
    pub interval: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let graph = GraphConfig::from_lookup(&lookup)?;
        let secs = match lookup(ENV_SYNC_INTERVAL_SECS) {
            None => DEFAULT_SYNC_INTERVAL_SECS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: ENV_SYNC_INTERVAL_SECS,
                        reason: format!("'{raw}' is not a positive number of seconds"),
                    })
                }
            },
        };
        Ok(Self {
            graph,
            interval: Duration::from_secs(secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(interval: Option<&'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| {
            let value = match key {
                "ROTAS_TENANT_ID" => "t",
                "ROTAS_CLIENT_ID" => "c",
                "ROTAS_CLIENT_SECRET" => "s",
                "ROTAS_SITE_NAME" => "SST",
                "ROTAS_FILE_PATH" => "/a.xlsm",
                ENV_SYNC_INTERVAL_SECS => interval?,
                _ => return None,
            };
            Some(value.to_string())
        }
    }

    #[test]
    fn interval_defaults_to_five_minutes() {
        let config = DaemonConfig::from_lookup(lookup(None)).expect("config");
        assert_eq!(config.interval, Duration::from_secs(300));
    }

    #[test]
    fn zero_or_garbage_interval_is_rejected() {
        for raw in ["0", "five", "-1"] {
            let err = DaemonConfig::from_lookup(lookup(Some(raw))).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    var: ENV_SYNC_INTERVAL_SECS,
                    ..
                }
            ));
        }
    }
}

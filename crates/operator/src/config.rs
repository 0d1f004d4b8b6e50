use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address of the health and metrics endpoint
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Periodic requeue of healthy JobSets
    pub resync_interval_seconds: u64,
    /// Requeue delay after a failed reconcile pass
    pub error_requeue_seconds: u64,
}

impl ControllerConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_seconds)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_seconds)
    }
}

fn env_seconds(key: &str, default: u64) -> crate::Result<u64> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| crate::Error::Config(format!("{} must be a number of seconds, got {:?}", key, value))),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Config::default();
        let config = Config {
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR").unwrap_or(defaults.server.addr),
            },
            controller: ControllerConfig {
                watch_namespace: std::env::var("WATCH_NAMESPACE")
                    .ok()
                    .filter(|ns| !ns.is_empty()),
                resync_interval_seconds: env_seconds(
                    "RESYNC_INTERVAL_SECONDS",
                    defaults.controller.resync_interval_seconds,
                )?,
                error_requeue_seconds: env_seconds(
                    "ERROR_REQUEUE_SECONDS",
                    defaults.controller.error_requeue_seconds,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.controller.resync_interval_seconds == 0 {
            return Err(crate::Error::Config(
                "RESYNC_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }
        if self.controller.error_requeue_seconds == 0 {
            return Err(crate::Error::Config(
                "ERROR_REQUEUE_SECONDS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Values given on the command line; each one that is set replaces the loaded value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub server_addr: Option<String>,
    pub watch_namespace: Option<String>,
    pub resync_interval_seconds: Option<u64>,
    pub error_requeue_seconds: Option<u64>,
}

impl Config {
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> crate::Result<Self> {
        if let Some(addr) = overrides.server_addr {
            self.server.addr = addr;
        }
        if let Some(namespace) = overrides.watch_namespace.filter(|ns| !ns.is_empty()) {
            self.controller.watch_namespace = Some(namespace);
        }
        if let Some(seconds) = overrides.resync_interval_seconds {
            self.controller.resync_interval_seconds = seconds;
        }
        if let Some(seconds) = overrides.error_requeue_seconds {
            self.controller.error_requeue_seconds = seconds;
        }
        self.validate()?;
        Ok(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
            controller: ControllerConfig {
                watch_namespace: None,
                resync_interval_seconds: 300,
                error_requeue_seconds: 30,
            },
        }
    }
}

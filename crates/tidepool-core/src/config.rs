//! tidepool.toml configuration parser.
//!
//! Configuration comes either from a TOML file or from `TIDEPOOL_*`
//! environment variables. Both paths end in `validate()`, which rejects
//! partial configuration so the daemon fails closed at startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_IDLE: &str = "2m";
const DEFAULT_POLL_INTERVAL: &str = "60s";
const DEFAULT_HTTP_TIMEOUT: &str = "10s";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub thresholds: ThresholdsConfig,
    pub poll: PollConfig,
    pub alert: AlertConfig,
    pub gateway: GatewayConfig,
    pub job_engine: JobEngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Shared idle threshold for both resources.
    pub idle: String,
    /// Override for the proxy app.
    pub app_idle: Option<String>,
    /// Override for the cluster.
    pub cluster_idle: Option<String>,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            idle: DEFAULT_IDLE.to_string(),
            app_idle: None,
            cluster_idle: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Cadence of the built-in trigger loop.
    pub interval: String,
    /// Upper bound on every outbound HTTP call.
    pub timeout: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the management gateway fronting the cloud APIs.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobEngineConfig {
    /// Base URL of the cluster's Livy endpoint.
    pub url: Option<String>,
}

/// Idle thresholds per watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleThresholds {
    pub app: Duration,
    pub cluster: Duration,
}

impl IdleThresholds {
    /// One threshold for both resources.
    pub fn shared(threshold: Duration) -> Self {
        Self {
            app: threshold,
            cluster: threshold,
        }
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Self::shared(Duration::from_secs(minutes * 60))
    }
}

impl ControllerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup.
    ///
    /// Every missing required variable is collected before returning, so
    /// one failed start reports all of them.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        let mut required = |name: &str| {
            let value = lookup(name);
            if value.is_none() {
                errors.push(ConfigError::Missing(name.to_string()));
            }
            value
        };

        let alert_url = required("TIDEPOOL_ALERT_URL");
        let gateway_url = required("TIDEPOOL_GATEWAY_URL");
        let livy_url = required("TIDEPOOL_LIVY_URL");

        if !errors.is_empty() {
            return Err(collapse(errors));
        }

        let defaults = ControllerConfig::default();
        let config = ControllerConfig {
            thresholds: ThresholdsConfig {
                idle: lookup("TIDEPOOL_IDLE_THRESHOLD").unwrap_or(defaults.thresholds.idle),
                app_idle: lookup("TIDEPOOL_APP_IDLE_THRESHOLD"),
                cluster_idle: lookup("TIDEPOOL_CLUSTER_IDLE_THRESHOLD"),
            },
            poll: PollConfig {
                interval: lookup("TIDEPOOL_POLL_INTERVAL").unwrap_or(defaults.poll.interval),
                timeout: lookup("TIDEPOOL_HTTP_TIMEOUT").unwrap_or(defaults.poll.timeout),
            },
            alert: AlertConfig { url: alert_url },
            gateway: GatewayConfig { url: gateway_url },
            job_engine: JobEngineConfig { url: livy_url },
        };
        Ok(config)
    }

    /// Check that every required setting is present and parseable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Err(e) = self.idle_thresholds() {
            errors.push(e);
        }
        if let Err(e) = self.poll_interval() {
            errors.push(e);
        }
        if let Err(e) = self.http_timeout() {
            errors.push(e);
        }
        for (key, url) in [
            ("alert.url", &self.alert.url),
            ("gateway.url", &self.gateway.url),
            ("job_engine.url", &self.job_engine.url),
        ] {
            if let Err(e) = check_url(key, url.as_deref()) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(collapse(errors))
        }
    }

    /// Effective idle thresholds, with per-resource overrides applied.
    pub fn idle_thresholds(&self) -> Result<IdleThresholds, ConfigError> {
        let shared = positive_duration("thresholds.idle", &self.thresholds.idle)?;
        let app = match &self.thresholds.app_idle {
            Some(s) => positive_duration("thresholds.app_idle", s)?,
            None => shared,
        };
        let cluster = match &self.thresholds.cluster_idle {
            Some(s) => positive_duration("thresholds.cluster_idle", s)?,
            None => shared,
        };
        Ok(IdleThresholds { app, cluster })
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        positive_duration("poll.interval", &self.poll.interval)
    }

    pub fn http_timeout(&self) -> Result<Duration, ConfigError> {
        positive_duration("poll.timeout", &self.poll.timeout)
    }
}

fn collapse(mut errors: Vec<ConfigError>) -> ConfigError {
    if errors.len() == 1 {
        errors.remove(0)
    } else {
        ConfigError::Multiple(errors)
    }
}

fn positive_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    match parse_duration(value) {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        None => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("not a duration: {value:?}"),
        }),
    }
}

fn check_url(key: &str, url: Option<&str>) -> Result<(), ConfigError> {
    let url = url.ok_or_else(|| ConfigError::Missing(key.to_string()))?;
    if !url.starts_with("http://") {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("expected an http:// URL, got {url:?}"),
        });
    }
    Ok(())
}

/// Parse a duration string like "5s", "500ms", "2m".
///
/// A bare number is read as seconds. Values too large to represent are
/// rejected like any other malformed input.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

//! Runtime configuration read from the environment.
//!
//! | Variable             | Default                        |
//! |----------------------|--------------------------------|
//! | `WEBHOOK_PORT`       | 9443                           |
//! | `HEALTH_PORT`        | 8080                           |
//! | `WEBHOOK_CERT_PATH`  | `/etc/webhook/certs/tls.crt`   |
//! | `WEBHOOK_KEY_PATH`   | `/etc/webhook/certs/tls.key`   |
//! | `MAX_CPU_MILLI`      | 100                            |
//! | `MAX_MEMORY_BYTES`   | 250000000                      |
//! | `MAX_REPLICAS`       | 2                              |
//! | `DENIAL_HTTP_STATUS` | 200 (`400` for legacy callers) |

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::webhooks::{DenialStatus, PolicyLimits};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

/// Invalid configuration value
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name}={value} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Webhook process configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub limits: PolicyLimits,
    pub denial_status: DenialStatus,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            limits: PolicyLimits::default(),
            denial_status: DenialStatus::default(),
        }
    }
}

impl WebhookConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let limits = PolicyLimits {
            max_cpu_milli: parse_or(&lookup, "MAX_CPU_MILLI", defaults.limits.max_cpu_milli)?,
            max_memory_bytes: parse_or(
                &lookup,
                "MAX_MEMORY_BYTES",
                defaults.limits.max_memory_bytes,
            )?,
            max_replicas: parse_or(&lookup, "MAX_REPLICAS", defaults.limits.max_replicas)?,
        };

        if limits.max_cpu_milli < 0 || limits.max_memory_bytes < 0 || limits.max_replicas < 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_*",
                value: format!("{limits:?}"),
                reason: "limits cannot be negative".to_string(),
            });
        }

        Ok(Self {
            webhook_port: parse_or(&lookup, "WEBHOOK_PORT", defaults.webhook_port)?,
            health_port: parse_or(&lookup, "HEALTH_PORT", defaults.health_port)?,
            cert_path: lookup("WEBHOOK_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
            limits,
            denial_status: parse_or(&lookup, "DENIAL_HTTP_STATUS", defaults.denial_status)?,
        })
    }

    /// Whether both TLS files exist on disk
    pub fn tls_available(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

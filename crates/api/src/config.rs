//! Process configuration read from the environment.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;

use ferrepos_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";
const DEV_ADMIN_EMAIL: &str = "admin@ferrepos.local";
const DEV_ADMIN_PASSWORD: &str = "admin";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Platform operator login. Not stored as an aggregate.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub admin: AdminCredentials,
    pub log_format: LogFormat,
    /// Keys that fell back to a dev default; logged once tracing is up.
    pub defaulted_secrets: Vec<&'static str>,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("token_ttl", &self.token_ttl)
            .field("admin", &self.admin)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = match lookup("BIND_ADDR") {
            Some(v) => v.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let token_ttl = match lookup("TOKEN_TTL_MINUTES") {
            Some(v) => {
                let minutes: i64 = v.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                    key: "TOKEN_TTL_MINUTES",
                    value: v.clone(),
                    reason: e.to_string(),
                })?;
                if minutes <= 0 {
                    return Err(ConfigError::Invalid {
                        key: "TOKEN_TTL_MINUTES",
                        value: v,
                        reason: "must be positive".to_string(),
                    });
                }
                Duration::minutes(minutes)
            }
            None => Duration::minutes(480),
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                key: "LOG_FORMAT",
                value: v.clone(),
                reason,
            })?,
            None => LogFormat::default(),
        };

        let mut defaulted_secrets = Vec::new();
        let mut secret = |key: &'static str, dev_default: &str| {
            lookup(key).unwrap_or_else(|| {
                defaulted_secrets.push(key);
                dev_default.to_string()
            })
        };
        let jwt_secret = secret("JWT_SECRET", DEV_JWT_SECRET);
        let email = secret("ADMIN_EMAIL", DEV_ADMIN_EMAIL);
        let password = secret("ADMIN_PASSWORD", DEV_ADMIN_PASSWORD);

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl,
            admin: AdminCredentials { email, password },
            log_format,
            defaulted_secrets,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.token_ttl, Duration::minutes(480));
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.defaulted_secrets, vec!["JWT_SECRET", "ADMIN_EMAIL", "ADMIN_PASSWORD"]);
    }

    #[test]
    fn explicit_values_win() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("TOKEN_TTL_MINUTES", "15"),
            ("ADMIN_EMAIL", "ops@ferrepos.com.py"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.token_ttl, Duration::minutes(15));
        assert_eq!(cfg.admin.email, "ops@ferrepos.com.py");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(config(&[("BIND_ADDR", "nowhere")]), Err(ConfigError::Invalid { key: "BIND_ADDR", .. })));
        assert!(matches!(
            config(&[("TOKEN_TTL_MINUTES", "0")]),
            Err(ConfigError::Invalid { key: "TOKEN_TTL_MINUTES", .. })
        ));
        assert!(matches!(config(&[("LOG_FORMAT", "xml")]), Err(ConfigError::Invalid { key: "LOG_FORMAT", .. })));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = config(&[("JWT_SECRET", "s3cr3t"), ("ADMIN_PASSWORD", "hunter2")]).unwrap();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("s3cr3t"));
        assert!(!shown.contains("hunter2"));
    }
}

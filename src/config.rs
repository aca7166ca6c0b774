//! Server configuration loaded from environment variables.
//!
//! All settings have defaults suitable for local development except the
//! JWT secret, which is required unless `DEV_MODE` is enabled.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `127.0.0.1` |
//! | `PORT` | `3000` |
//! | `DATA_DIR` | `./data` |
//! | `UPLOADS_DIR` | `{DATA_DIR}/uploads` |
//! | `USERS_FILE` | `{DATA_DIR}/users.json` |
//! | `DEV_MODE` | `false` |
//! | `JWT_SECRET` | none |
//! | `JWT_TTL_DAYS` | `30` |
//! | `TASK_WRITE_RETRIES` | `5` |
//! | `MAIL_TENANT_ID`, `MAIL_CLIENT_ID`, `MAIL_CLIENT_SECRET`, `MAIL_SENDER` | none (mail disabled) |

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("JWT_SECRET must be set when DEV_MODE is disabled")]
    MissingJwtSecret,
}

/// Token settings for the login endpoint and the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_ttl_days: i64,
}

impl AuthConfig {
    /// Whether protected routes must present a bearer token.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }
}

/// Microsoft Graph client-credential settings for outbound mail.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Mailbox the notifications are sent from.
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub users_file: PathBuf,
    pub dev_mode: bool,
    pub auth: AuthConfig,
    /// How many times a task mutation is re-attempted after a version conflict.
    pub task_write_retries: u32,
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or("PORT", var("PORT"), 3000u16)?;
        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));
        let uploads_dir = var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("uploads"));
        let users_file = var("USERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("users.json"));
        let dev_mode = parse_bool("DEV_MODE", var("DEV_MODE"))?;

        let auth = AuthConfig {
            jwt_secret: var("JWT_SECRET"),
            jwt_ttl_days: parse_or("JWT_TTL_DAYS", var("JWT_TTL_DAYS"), 30i64)?,
        };
        if auth.auth_required(dev_mode) && auth.jwt_secret.is_none() {
            return Err(ConfigError::MissingJwtSecret);
        }

        let task_write_retries = parse_or("TASK_WRITE_RETRIES", var("TASK_WRITE_RETRIES"), 5u32)?;

        let mail = match (
            var("MAIL_TENANT_ID"),
            var("MAIL_CLIENT_ID"),
            var("MAIL_CLIENT_SECRET"),
            var("MAIL_SENDER"),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret), Some(sender)) => {
                Some(MailConfig {
                    tenant_id,
                    client_id,
                    client_secret,
                    sender,
                })
            }
            _ => None,
        };

        Ok(Self {
            host,
            port,
            data_dir,
            uploads_dir,
            users_file,
            dev_mode,
            auth,
            task_write_retries,
            mail,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::InvalidValue { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_dev_mode_defaults() {
        let config = Config::from_lookup(lookup(&[("DEV_MODE", "true")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.uploads_dir, PathBuf::from("./data/uploads"));
        assert_eq!(config.task_write_retries, 5);
        assert!(config.mail.is_none());
    }

    #[test]
    fn test_secret_required_outside_dev_mode() {
        let result = Config::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::MissingJwtSecret)));
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_lookup(lookup(&[("DEV_MODE", "1"), ("PORT", "http")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "PORT", .. })
        ));
    }

    #[test]
    fn test_mail_requires_all_fields() {
        let partial = Config::from_lookup(lookup(&[
            ("DEV_MODE", "1"),
            ("MAIL_TENANT_ID", "t"),
            ("MAIL_CLIENT_ID", "c"),
        ]))
        .unwrap();
        assert!(partial.mail.is_none());

        let full = Config::from_lookup(lookup(&[
            ("DEV_MODE", "1"),
            ("MAIL_TENANT_ID", "t"),
            ("MAIL_CLIENT_ID", "c"),
            ("MAIL_CLIENT_SECRET", "s"),
            ("MAIL_SENDER", "ops@example.com"),
        ]))
        .unwrap();
        assert_eq!(full.mail.unwrap().sender, "ops@example.com");
    }
}

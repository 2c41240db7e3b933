//! Runtime configuration read from the environment (and an optional `.env` file).

use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Default consent values written on every customer created by a bulk import.
///
/// The defaults grant both consents and stamp `data_consenso`, which is how the
/// importer has always behaved. Changing them is a product decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentPolicy {
    pub privacy: bool,
    pub marketing: bool,
    pub stamp_date: bool,
}

impl Default for ConsentPolicy {
    fn default() -> Self {
        Self {
            privacy: true,
            marketing: true,
            stamp_date: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Email of the user recorded as `created_by` on imported rows.
    pub actor_email: String,
    pub job_ttl: Duration,
    pub eviction_interval: Duration,
    pub max_upload_bytes: usize,
    pub consent: ConsentPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("gestionale_energia.db"),
            actor_email: "admin@gestionale.it".to_string(),
            job_ttl: Duration::from_secs(3600),
            eviction_interval: Duration::from_secs(60),
            max_upload_bytes: 20 * 1024 * 1024,
            consent: ConsentPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Loads `.env` if present, then overlays environment variables on the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", get("PORT"), defaults.port)?,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            actor_email: get("IMPORT_ACTOR_EMAIL").unwrap_or(defaults.actor_email),
            job_ttl: Duration::from_secs(parse_var(
                "IMPORT_JOB_TTL_SECS",
                get("IMPORT_JOB_TTL_SECS"),
                defaults.job_ttl.as_secs(),
            )?),
            eviction_interval: Duration::from_secs(
                parse_var(
                    "IMPORT_EVICTION_INTERVAL_SECS",
                    get("IMPORT_EVICTION_INTERVAL_SECS"),
                    defaults.eviction_interval.as_secs(),
                )?
                .max(1),
            ),
            max_upload_bytes: parse_var(
                "IMPORT_MAX_UPLOAD_BYTES",
                get("IMPORT_MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            )?,
            consent: ConsentPolicy {
                privacy: parse_flag(
                    "IMPORT_CONSENT_PRIVACY",
                    get("IMPORT_CONSENT_PRIVACY"),
                    defaults.consent.privacy,
                )?,
                marketing: parse_flag(
                    "IMPORT_CONSENT_MARKETING",
                    get("IMPORT_CONSENT_MARKETING"),
                    defaults.consent.marketing,
                )?,
                stamp_date: parse_flag(
                    "IMPORT_CONSENT_STAMP_DATE",
                    get("IMPORT_CONSENT_STAMP_DATE"),
                    defaults.consent.stamp_date,
                )?,
            },
        })
    }
}

fn parse_var<T: FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn parse_flag(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value }),
        },
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("gestionale_energia.db"));
        assert_eq!(config.actor_email, "admin@gestionale.it");
        assert_eq!(config.consent, ConsentPolicy::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9090"),
            ("DATABASE_PATH", "/tmp/crm.db"),
            ("IMPORT_JOB_TTL_SECS", "10"),
            ("IMPORT_CONSENT_MARKETING", "false"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.database_path, PathBuf::from("/tmp/crm.db"));
        assert_eq!(config.job_ttl, Duration::from_secs(10));
        assert!(config.consent.privacy);
        assert!(!config.consent.marketing);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "PORT",
                value: "eighty".to_string()
            }
        );

        let err =
            ServerConfig::from_lookup(lookup(&[("IMPORT_CONSENT_PRIVACY", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("IMPORT_CONSENT_PRIVACY"));
    }
}

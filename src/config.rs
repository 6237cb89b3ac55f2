use {
    crate::domain::id::IntegrationId,
    crate::services::{retry::RetryPolicy, timestamp::DEFAULT_MAX_AGE_SECS},
    std::{env, str::FromStr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name}: invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{name}: must be greater than zero")]
    Zero { name: &'static str },
}

/// Knobs of the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub timestamp_max_age_secs: i64,
    pub dedup_ttl: Duration,
    pub handler_timeout: Duration,
    pub workers: usize,
}

impl PipelineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_base_delay,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_base_delay: Duration::from_millis(2000),
            timestamp_max_age_secs: DEFAULT_MAX_AGE_SECS,
            dedup_ttl: Duration::from_secs(24 * 60 * 60),
            handler_timeout: Duration::from_secs(30),
            workers: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Without a database the service runs on in-memory stores.
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// Seeded into the in-memory integration store for local runs.
    pub dev_integration: Option<DevIntegration>,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct DevIntegration {
    pub id: IntegrationId,
    pub webhook_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = PipelineSettings::default();

        let max_retries = parse_or(&lookup, "WEBHOOK_MAX_RETRIES", defaults.max_retries)?;
        let base_delay_ms = parse_or(
            &lookup,
            "WEBHOOK_RETRY_BASE_DELAY_MS",
            defaults.retry_base_delay.as_millis() as u64,
        )?;
        let max_age = parse_or(
            &lookup,
            "WEBHOOK_TIMESTAMP_MAX_AGE_SECS",
            defaults.timestamp_max_age_secs,
        )?;
        let dedup_ttl = parse_or(&lookup, "WEBHOOK_DEDUP_TTL_SECS", defaults.dedup_ttl.as_secs())?;
        let handler_timeout = parse_or(
            &lookup,
            "WEBHOOK_HANDLER_TIMEOUT_SECS",
            defaults.handler_timeout.as_secs(),
        )?;
        let workers = parse_or(&lookup, "WEBHOOK_WORKERS", defaults.workers)?;

        if max_age <= 0 {
            return Err(ConfigError::Zero {
                name: "WEBHOOK_TIMESTAMP_MAX_AGE_SECS",
            });
        }
        if dedup_ttl == 0 {
            return Err(ConfigError::Zero {
                name: "WEBHOOK_DEDUP_TTL_SECS",
            });
        }
        if handler_timeout == 0 {
            return Err(ConfigError::Zero {
                name: "WEBHOOK_HANDLER_TIMEOUT_SECS",
            });
        }
        if workers == 0 {
            return Err(ConfigError::Zero {
                name: "WEBHOOK_WORKERS",
            });
        }

        let dev_integration = match lookup("WEBHOOK_DEV_INTEGRATION_ID") {
            Some(raw) => Some(DevIntegration {
                id: raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "WEBHOOK_DEV_INTEGRATION_ID",
                    value: raw.clone(),
                })?,
                webhook_secret: lookup("WEBHOOK_DEV_SECRET"),
            }),
            None => None,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            dev_integration,
            pipeline: PipelineSettings {
                max_retries,
                retry_base_delay: Duration::from_millis(base_delay_ms),
                timestamp_max_age_secs: max_age,
                dedup_ttl: Duration::from_secs(dedup_ttl),
                handler_timeout: Duration::from_secs(handler_timeout),
                workers,
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

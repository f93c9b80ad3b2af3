use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use thiserror::Error;

use crate::observability::tracing::TracingSettings;
use crate::pipeline::CoordinatorSettings;
use crate::util::retry::RetryPolicy;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

const MAX_CONCURRENCY: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    db_dsn: String,
    db_max_connections: u32,
    db_min_connections: u32,
    db_acquire_timeout: Duration,
    llm_base_url: String,
    llm_api_key: String,
    llm_model: String,
    llm_timeout: Duration,
    concurrency: usize,
    retry_attempts: usize,
    backoff_base: Duration,
    default_batch_limit: usize,
    max_batch_limit: usize,
    stale_after: Duration,
    otel_exporter_endpoint: Option<String>,
    otel_sampling_ratio: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// Reads and validates the worker configuration from the environment.
    ///
    /// # Errors
    /// [`ConfigError::Missing`] when `CLASSIFY_DB_DSN` or `LLM_API_KEY` is
    /// unset, [`ConfigError::Invalid`] when a value does not parse or is out
    /// of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_dsn = env_var("CLASSIFY_DB_DSN")?;
        let llm_api_key = env_var("LLM_API_KEY")?;
        let http_bind = parse_env(
            "CLASSIFY_WORKER_HTTP_BIND",
            Some(SocketAddr::from(([0, 0, 0, 0], 9010))),
        )?;

        let llm_base_url =
            env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1/".to_string());
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string());
        let llm_timeout = Duration::from_millis(parse_env("CLASSIFY_LLM_TIMEOUT_MS", Some(30_000u64))?);

        let concurrency = parse_in_range("CLASSIFY_CONCURRENCY", 3, 1, MAX_CONCURRENCY)?;
        let retry_attempts = parse_in_range("CLASSIFY_RETRY_ATTEMPTS", 2, 1, usize::MAX)?;
        let backoff_base = Duration::from_millis(parse_env("CLASSIFY_BACKOFF_BASE_MS", Some(500u64))?);

        let max_batch_limit = parse_in_range("CLASSIFY_MAX_BATCH_LIMIT", 100, 1, usize::MAX)?;
        let default_batch_limit =
            parse_in_range("CLASSIFY_DEFAULT_BATCH_LIMIT", 10, 1, max_batch_limit)?;
        let stale_after =
            Duration::from_secs(parse_env("CLASSIFY_STALE_AFTER_SECS", Some(900u64))?);
        let item_budget = RetryPolicy::new(retry_attempts, backoff_base, Some(llm_timeout))
            .worst_case_duration()
            .unwrap_or(Duration::MAX);
        if stale_after <= item_budget {
            return Err(ConfigError::Invalid {
                name: "CLASSIFY_STALE_AFTER_SECS",
                source: anyhow::anyhow!(
                    "must exceed the worst-case item time of {}s",
                    item_budget.as_secs_f64()
                ),
            });
        }

        let db_max_connections = parse_env("CLASSIFY_DB_MAX_CONNECTIONS", Some(10u32))?;
        let db_min_connections = parse_env("CLASSIFY_DB_MIN_CONNECTIONS", Some(1u32))?;
        if db_min_connections > db_max_connections {
            return Err(ConfigError::Invalid {
                name: "CLASSIFY_DB_MIN_CONNECTIONS",
                source: anyhow::anyhow!("must not exceed CLASSIFY_DB_MAX_CONNECTIONS"),
            });
        }
        let db_acquire_timeout =
            Duration::from_secs(parse_env("CLASSIFY_DB_ACQUIRE_TIMEOUT_SECS", Some(30u64))?);

        let otel_exporter_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let otel_sampling_ratio = parse_env("OTEL_SAMPLING_RATIO", Some(1.0f64))?;
        if !(0.0..=1.0).contains(&otel_sampling_ratio) {
            return Err(ConfigError::Invalid {
                name: "OTEL_SAMPLING_RATIO",
                source: anyhow::anyhow!("must be between 0.0 and 1.0"),
            });
        }

        Ok(Self {
            http_bind,
            db_dsn,
            db_max_connections,
            db_min_connections,
            db_acquire_timeout,
            llm_base_url,
            llm_api_key,
            llm_model,
            llm_timeout,
            concurrency,
            retry_attempts,
            backoff_base,
            default_batch_limit,
            max_batch_limit,
            stale_after,
            otel_exporter_endpoint,
            otel_sampling_ratio,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn db_dsn(&self) -> &str {
        &self.db_dsn
    }

    #[must_use]
    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    #[must_use]
    pub fn db_min_connections(&self) -> u32 {
        self.db_min_connections
    }

    #[must_use]
    pub fn db_acquire_timeout(&self) -> Duration {
        self.db_acquire_timeout
    }

    #[must_use]
    pub fn llm_base_url(&self) -> &str {
        &self.llm_base_url
    }

    #[must_use]
    pub fn llm_api_key(&self) -> &str {
        &self.llm_api_key
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    #[must_use]
    pub fn default_batch_limit(&self) -> usize {
        self.default_batch_limit
    }

    #[must_use]
    pub fn max_batch_limit(&self) -> usize {
        self.max_batch_limit
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    #[must_use]
    pub fn tracing_settings(&self) -> TracingSettings {
        TracingSettings {
            otlp_endpoint: self.otel_exporter_endpoint.clone(),
            sampling_ratio: self.otel_sampling_ratio,
        }
    }

    /// Retry budget for one model call.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.backoff_base, Some(self.llm_timeout))
    }

    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            concurrency: self.concurrency,
            default_limit: self.default_batch_limit,
            max_limit: self.max_batch_limit,
            retry: self.retry_policy(),
        }
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Parses `name` when set, otherwise falls back to `default`.
fn parse_env<T>(name: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(error),
        }),
        Err(_) => default.ok_or(ConfigError::Missing(name)),
    }
}

fn parse_in_range(
    name: &'static str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, ConfigError> {
    let value = parse_env(name, Some(default))?;
    if value < min || value > max {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be between {min} and {max}, got {value}"),
        });
    }
    Ok(value)
}

//! Process configuration, read from environment variables.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment environment; selects log format and default verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Human-readable debug logs
    Local,
    /// JSON debug logs
    Dev,
    /// JSON info logs
    Prod,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    pub fn json_logs(self) -> bool {
        !matches!(self, Self::Local)
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Self::Local | Self::Dev => "info,order_ingest=debug",
            Self::Prod => "info",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    /// HTTP port (order lookups, metrics, health)
    pub http_port: u16,
    /// Upper bound for draining the HTTP server on shutdown
    pub shutdown_timeout: Duration,
    /// Initial wait before a failed message is fetched again
    pub redelivery_backoff: Duration,
    pub redelivery_backoff_max: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    pub topic: String,
    pub group_id: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let environment = parse_or(&var, "ENVIRONMENT", Environment::Local)?;

        let database = DatabaseConfig {
            url: match var("DATABASE_URL") {
                Some(url) => url,
                None => database_url_from_parts(&var)?,
            },
            max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let kafka = KafkaConfig {
            brokers: var("KAFKA_BROKERS")
                .unwrap_or_else(|| "127.0.0.1:9092".into())
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(String::from)
                .collect(),
            topic: var("KAFKA_TOPIC").unwrap_or_else(|| "orders".into()),
            group_id: var("KAFKA_GROUP_ID").unwrap_or_else(|| "orders-service".into()),
        };
        if kafka.brokers.is_empty() {
            return Err(ConfigError::Missing("KAFKA_BROKERS"));
        }

        Ok(Self {
            environment,
            database,
            kafka,
            http_port: parse_or(&var, "HTTP_PORT", 8081)?,
            shutdown_timeout: Duration::from_secs(parse_or(&var, "SHUTDOWN_TIMEOUT_SECS", 5)?),
            redelivery_backoff: Duration::from_millis(parse_or(&var, "REDELIVERY_BACKOFF_MS", 200)?),
            redelivery_backoff_max: Duration::from_millis(parse_or(
                &var,
                "REDELIVERY_BACKOFF_MAX_MS",
                10_000,
            )?),
        })
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn database_url_from_parts<F>(var: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let password = var("POSTGRES_PASSWORD").ok_or(ConfigError::Missing("POSTGRES_PASSWORD"))?;
    let host = var("POSTGRES_HOST").unwrap_or_else(|| "localhost".into());
    let port = var("POSTGRES_PORT").unwrap_or_else(|| "5432".into());
    let user = var("POSTGRES_USER").unwrap_or_else(|| "postgres".into());
    let db = var("POSTGRES_DB").unwrap_or_else(|| "orders".into());
    let sslmode = var("POSTGRES_SSLMODE").unwrap_or_else(|| "disable".into());

    Ok(format!("postgres://{user}:{password}@{host}:{port}/{db}?sslmode={sslmode}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://u:p@db/orders")]).unwrap();

        assert_eq!(config.environment, Environment::Local);
        assert_eq!(config.database.url, "postgres://u:p@db/orders");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.kafka.brokers, vec!["127.0.0.1:9092".to_string()]);
        assert_eq!(config.kafka.topic, "orders");
        assert_eq!(config.kafka.group_id, "orders-service");
        assert_eq!(config.http_port, 8081);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.redelivery_backoff, Duration::from_millis(200));
        assert_eq!(config.redelivery_backoff_max, Duration::from_secs(10));
    }

    #[test]
    fn test_database_url_built_from_parts() {
        let config = load(&[
            ("POSTGRES_HOST", "pg"),
            ("POSTGRES_USER", "orders"),
            ("POSTGRES_PASSWORD", "secret"),
            ("POSTGRES_DB", "l0"),
        ])
        .unwrap();

        assert_eq!(
            config.database.url,
            "postgres://orders:secret@pg:5432/l0?sslmode=disable"
        );
    }

    #[test]
    fn test_password_required_without_url() {
        let err = load(&[("POSTGRES_HOST", "pg")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("POSTGRES_PASSWORD")));
    }

    #[test]
    fn test_broker_list_is_split_and_trimmed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db"),
            ("KAFKA_BROKERS", "kafka-1:9092, kafka-2:9092,"),
        ])
        .unwrap();

        assert_eq!(config.kafka.brokers, vec!["kafka-1:9092", "kafka-2:9092"]);
    }

    #[test]
    fn test_environment_selects_log_format() {
        let dev = load(&[("DATABASE_URL", "postgres://db"), ("ENVIRONMENT", "dev")]).unwrap();
        let prod = load(&[("DATABASE_URL", "postgres://db"), ("ENVIRONMENT", "prod")]).unwrap();

        assert_eq!(dev.environment, Environment::Dev);
        assert!(dev.environment.json_logs());
        assert_eq!(dev.environment.default_log_filter(), "info,order_ingest=debug");
        assert_eq!(prod.environment, Environment::Prod);
        assert!(prod.environment.json_logs());
        assert_eq!(prod.environment.default_log_filter(), "info");
        assert!(!Environment::Local.json_logs());
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://db"), ("ENVIRONMENT", "staging")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ENVIRONMENT", .. }));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://db"), ("HTTP_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HTTP_PORT", .. }));
    }
}

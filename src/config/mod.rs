/// Runtime configuration
///
/// Defaults work out of the box for local development; every knob can be
/// overridden through `FLOWGATE_*` environment variables. Unparsable values
/// fall back to the default with a warning instead of failing startup.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the SQLite database file.
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Admission limit: executions running at once.
    pub max_concurrent_executions: usize,
    /// Backoff between a failed attempt and its re-enqueue.
    pub retry_delay_ms: u64,
    /// How long a finished execution stays fully queryable.
    pub retention_secs: u64,
    /// Bounded summary history size.
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                data_dir: "./data".to_string(),
            },
            engine: EngineConfig {
                max_concurrent_executions: 8,
                retry_delay_ms: 1_000,
                retention_secs: 60,
                history_limit: 1_000,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            server: ServerConfig {
                host: env_or("FLOWGATE_HOST", default.server.host),
                port: env_parsed("FLOWGATE_PORT", default.server.port),
            },
            database: DatabaseConfig {
                data_dir: env_or("FLOWGATE_DATA_DIR", default.database.data_dir),
            },
            engine: EngineConfig {
                max_concurrent_executions: env_parsed(
                    "FLOWGATE_MAX_CONCURRENT",
                    default.engine.max_concurrent_executions,
                ),
                retry_delay_ms: env_parsed(
                    "FLOWGATE_RETRY_DELAY_MS",
                    default.engine.retry_delay_ms,
                ),
                retention_secs: env_parsed(
                    "FLOWGATE_RETENTION_SECS",
                    default.engine.retention_secs,
                ),
                history_limit: env_parsed(
                    "FLOWGATE_HISTORY_LIMIT",
                    default.engine.history_limit,
                ),
            },
        }
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}/flowgate.db", self.database.data_dir)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parsed<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("⚠️ unparsable {}='{}', using default {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.engine.max_concurrent_executions, 8);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert!(config.database_url().ends_with("flowgate.db"));
    }
}

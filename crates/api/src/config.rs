use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use rebate_core::engine::EngineConfig;
use rebate_core::evaluation::EvaluationConfig;
use rebate_core::service::ServiceConfig;

/// Where rules, calculations and reports are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Postgres via `DATABASE_URL`; reconciliation data read from the same
    /// database.
    Postgres,
    /// Process-local storage seeded with demo contracts. Nothing survives a
    /// restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("expected 'postgres' or 'memory', got '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub storage: StorageBackend,
    /// Required when `storage` is [`StorageBackend::Postgres`].
    pub database_url: Option<String>,
    /// Engine thresholds and metrics defaults.
    pub service: ServiceConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                    |
    /// | `STORAGE_BACKEND`          | `postgres`              |
    /// | `DATABASE_URL`             | (none)                  |
    /// | `GL_PASS_TOLERANCE_PCT`    | `0.5`                   |
    /// | `GL_WARN_TOLERANCE_PCT`    | `2`                     |
    /// | `TERMS_PASS_TOLERANCE_PCT` | `0.1`                   |
    /// | `TERMS_WARN_TOLERANCE_PCT` | `1`                     |
    /// | `ITEM_MATCH_PASS_RATIO`    | `0.98`                  |
    /// | `ITEM_MATCH_WARN_RATIO`    | `0.90`                  |
    /// | `CATEGORY_TIMEOUT_SECS`    | `10`                    |
    /// | `METRICS_TOP_FAILURES`     | `5`                     |
    ///
    /// Panics on unparseable values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let cors_origins = parse("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let evaluation = EvaluationConfig {
            ledger_pass_tolerance_pct: typed(&parse, "GL_PASS_TOLERANCE_PCT", "0.5"),
            ledger_warn_tolerance_pct: typed(&parse, "GL_WARN_TOLERANCE_PCT", "2"),
            terms_pass_tolerance_pct: typed(&parse, "TERMS_PASS_TOLERANCE_PCT", "0.1"),
            terms_warn_tolerance_pct: typed(&parse, "TERMS_WARN_TOLERANCE_PCT", "1"),
            item_match_pass_ratio: typed(&parse, "ITEM_MATCH_PASS_RATIO", "0.98"),
            item_match_warn_ratio: typed(&parse, "ITEM_MATCH_WARN_RATIO", "0.90"),
        };
        let category_timeout_secs: u64 = typed(&parse, "CATEGORY_TIMEOUT_SECS", "10");

        Self {
            host: parse("HOST", "0.0.0.0"),
            port: typed(&parse, "PORT", "3000"),
            cors_origins,
            request_timeout_secs: typed(&parse, "REQUEST_TIMEOUT_SECS", "30"),
            shutdown_timeout_secs: typed(&parse, "SHUTDOWN_TIMEOUT_SECS", "30"),
            storage: typed(&parse, "STORAGE_BACKEND", "postgres"),
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            service: ServiceConfig {
                engine: EngineConfig {
                    evaluation,
                    category_timeout: Duration::from_secs(category_timeout_secs),
                },
                top_failures: typed(&parse, "METRICS_TOP_FAILURES", "5"),
            },
        }
    }
}

fn typed<T>(parse: &impl Fn(&str, &str) -> String, key: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let raw = parse(key, default);
    raw.parse()
        .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.service.top_failures, 5);
        assert_eq!(config.service.engine.category_timeout, Duration::from_secs(10));
        assert_eq!(config.service.engine.evaluation, EvaluationConfig::default());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("STORAGE_BACKEND", "Memory"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("GL_WARN_TOLERANCE_PCT", "3.5"),
            ("ITEM_MATCH_PASS_RATIO", "0.95"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(
            config.service.engine.evaluation.ledger_warn_tolerance_pct.to_string(),
            "3.5"
        );
        assert_eq!(config.service.engine.evaluation.item_match_pass_ratio, 0.95);
    }

    #[test]
    #[should_panic(expected = "STORAGE_BACKEND")]
    fn unknown_backend_panics() {
        config_from(&[("STORAGE_BACKEND", "sqlite")]);
    }
}

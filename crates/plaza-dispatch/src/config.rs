//! Configuration for the Plaza dispatcher.
//!
//! Loaded from `plaza.toml` (optional) and `PLAZA__`-prefixed environment
//! variables, e.g. `PLAZA__NEO4J__URI` or `PLAZA__DISPATCH__MAX_PAGE_SIZE`.

use serde::Deserialize;

use plaza_graph::{DuplicatePolicy, GraphConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlazaConfig {
    #[serde(default)]
    pub neo4j: GraphConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Request handling defaults and limits.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Page size used when a listing omits `limit`.
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    /// Largest `limit` a caller may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,

    /// Distances below this are clamped before taking the reciprocal.
    #[serde(default = "default_min_distance")]
    pub min_distance: f64,

    /// Policy for `add_relationship` when the payload does not choose one.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}

fn default_page_size() -> i64 {
    10
}

fn default_max_page_size() -> i64 {
    100
}

fn default_min_distance() -> f64 {
    1e-6
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            min_distance: default_min_distance(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl PlazaConfig {
    /// Load from `<file_prefix>.toml` (if present) layered under the environment.
    pub fn load(file_prefix: &str) -> Result<Self, config::ConfigError> {
        let config: PlazaConfig = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("PLAZA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.dispatch.check()?;
        Ok(config)
    }
}

impl DispatchConfig {
    fn check(&self) -> Result<(), config::ConfigError> {
        if self.min_distance.is_nan() || self.min_distance <= 0.0 {
            return Err(config::ConfigError::Message(format!(
                "dispatch.min_distance must be positive, got {}",
                self.min_distance
            )));
        }
        if self.max_page_size < 1 || !(1..=self.max_page_size).contains(&self.default_page_size) {
            return Err(config::ConfigError::Message(format!(
                "dispatch.default_page_size ({}) must be within 1..={}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PlazaConfig::default();
        assert_eq!(config.dispatch.default_page_size, 10);
        assert_eq!(config.dispatch.max_page_size, 100);
        assert_eq!(config.dispatch.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.log.filter, "info");
        assert!(config.dispatch.check().is_ok());
    }

    #[test]
    fn sections_fall_back_to_defaults() {
        let config: PlazaConfig = serde_json::from_value(serde_json::json!({
            "dispatch": {"max_page_size": 25, "duplicate_policy": "merge"}
        }))
        .unwrap();
        assert_eq!(config.dispatch.max_page_size, 25);
        assert_eq!(config.dispatch.default_page_size, 10);
        assert_eq!(config.dispatch.duplicate_policy, DuplicatePolicy::Merge);
        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
    }

    #[test]
    fn non_positive_min_distance_is_rejected() {
        let dispatch = DispatchConfig {
            min_distance: 0.0,
            ..Default::default()
        };
        assert!(dispatch.check().is_err());
    }

    #[test]
    fn default_page_size_must_fit_under_max() {
        let dispatch = DispatchConfig {
            default_page_size: 50,
            max_page_size: 20,
            ..Default::default()
        };
        assert!(dispatch.check().is_err());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = PlazaConfig::load("definitely-not-a-plaza-config").unwrap();
        assert_eq!(config.dispatch.max_page_size, 100);
    }
}

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShowdownError};
use crate::output::OutputFormat;
use crate::retrieval::{DEFAULT_CONCURRENCY, DEFAULT_MIN_INTERVAL};
use crate::rules::builtin::DEFAULT_RULES;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".showdown.toml";

/// Top-level configuration from `.showdown.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Maximum simultaneous fetches.
    pub concurrency: usize,
    /// Minimum delay between starting consecutive fetches.
    pub min_interval_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            min_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64,
        }
    }
}

impl RetrievalConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Rule names to run, in order.
    pub enabled: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_RULES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Console,
            color: true,
        }
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.concurrency == 0 {
            return Err(ShowdownError::Config(
                "retrieval.concurrency must be at least 1".into(),
            ));
        }
        if self.rules.enabled.is_empty() {
            return Err(ShowdownError::Config("rules.enabled must name at least one rule".into()));
        }
        Ok(())
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# showdown configuration

[retrieval]
# Maximum simultaneous Shodan lookups.
concurrency = 10
# Minimum delay between starting consecutive lookups (milliseconds).
min_interval_ms = 1000

[rules]
# Rules to run, see `showdown list-rules`.
enabled = ["info", "vulns"]

[output]
# console | csv | json
format = "console"
color = true
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn starter_parses_to_defaults() {
        let config = Config::from_toml(Config::starter_toml()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.retrieval.min_interval(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.rules.enabled, vec!["info", "vulns"]);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[output]\nformat = \"csv\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert!(config.output.color);
        assert_eq!(config.retrieval.concurrency, 10);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = Config::from_toml("[retrieval]\nconcurrency = 0\n").unwrap_err();
        assert!(matches!(err, ShowdownError::Config(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml("[retrieval]\nthreads = 4\n"),
            Err(ShowdownError::Toml(_))
        ));
    }
}

//! Server configuration
//!
//! Built-in defaults, then an optional TOML file, then `CARPRICE_*`
//! environment variables. Command-line flags are applied on top by the
//! binary through [`ServerConfig::apply_overrides`].

use anyhow::{Context, Result};
use carprice_core::{ArtifactPaths, UnknownCategoryPolicy};
use config::{Config, File as ConfigFile};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix of environment overrides (`CARPRICE_PORT`, `CARPRICE_ARTIFACTS_DIR`, ...)
pub const ENV_PREFIX: &str = "CARPRICE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "unknown log format '{other}' (expected 'compact' or 'pretty')"
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => f.write_str("compact"),
            LogFormat::Pretty => f.write_str("pretty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub artifacts_dir: PathBuf,
    /// Engineered dataset for row mode and the catalog; `None` disables both
    pub dataset_path: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub unknown_category_policy: UnknownCategoryPolicy,
    /// Exit at startup instead of serving `unhealthy` when the model fails to load
    pub require_artifacts: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            artifacts_dir: PathBuf::from("artifacts"),
            dataset_path: Some(PathBuf::from("artifacts/engineered.csv")),
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            unknown_category_policy: UnknownCategoryPolicy::Ignore,
            require_artifacts: false,
        }
    }
}

/// Flag values that take precedence over file and environment settings
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub artifacts_dir: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub unknown_category_policy: Option<UnknownCategoryPolicy>,
    pub require_artifacts: bool,
}

impl ServerConfig {
    /// Layer the optional file and the environment over the defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            builder = builder.add_source(ConfigFile::from(path));
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let config = builder.build().context("Failed to read configuration")?;
        Self::from_config(&config)
    }

    /// Read known keys, keeping defaults for anything unset
    pub fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let port = match get_string_value(config, &["port"]) {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("port must be an integer in 0-65535, got '{raw}'"))?,
            None => defaults.port,
        };

        let log_format = match get_string_value(config, &["log_format"]) {
            Some(raw) => raw.parse::<LogFormat>().map_err(anyhow::Error::msg)?,
            None => defaults.log_format,
        };

        let unknown_category_policy = match get_string_value(config, &["unknown_category_policy"]) {
            Some(raw) => raw
                .parse::<UnknownCategoryPolicy>()
                .map_err(anyhow::Error::msg)?,
            None => defaults.unknown_category_policy,
        };

        let dataset_path = match get_string_value(config, &["dataset_path"]) {
            Some(raw) if is_disabled(&raw) => None,
            Some(raw) => Some(PathBuf::from(raw)),
            None => defaults.dataset_path,
        };

        Ok(Self {
            host: get_string_value(config, &["host"]).unwrap_or(defaults.host),
            port,
            artifacts_dir: get_string_value(config, &["artifacts_dir"])
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_dir),
            dataset_path,
            log_level: get_string_value(config, &["log_level"]).unwrap_or(defaults.log_level),
            log_format,
            unknown_category_policy,
            require_artifacts: get_bool_value(
                config,
                &["require_artifacts"],
                defaults.require_artifacts,
            ),
        })
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = overrides.artifacts_dir {
            self.artifacts_dir = dir;
        }
        if let Some(path) = overrides.dataset_path {
            self.dataset_path = Some(path);
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }
        if let Some(policy) = overrides.unknown_category_policy {
            self.unknown_category_policy = policy;
        }
        if overrides.require_artifacts {
            self.require_artifacts = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("host must not be empty");
        }
        if self.port == 0 {
            anyhow::bail!("port must be greater than zero");
        }
        if self.artifacts_dir.as_os_str().is_empty() {
            anyhow::bail!("artifacts_dir must not be empty");
        }
        if self.log_level.trim().is_empty() {
            anyhow::bail!("log_level must not be empty");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.artifacts_dir)
    }
}

fn is_disabled(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "none" | "off" | "disabled")
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.trim().parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}

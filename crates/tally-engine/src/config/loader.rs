//! Configuration sources: one YAML file, then `TALLY_*` environment overrides.

use super::schema::TallyConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Names a config file to use instead of the search locations.
pub const CONFIG_PATH_VAR: &str = "TALLY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Finds, reads and validates the configuration.
///
/// The file is the first of: an explicit path, `$TALLY_CONFIG`, then the
/// search locations (`./tally.yaml`, `~/.tally/config.yaml`). With no file the
/// defaults apply. Environment variables override single settings afterwards.
pub struct ConfigLoader {
    env: EnvLookup,
    search: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        let mut search = vec![PathBuf::from("tally.yaml")];
        search.extend(dirs::home_dir().map(|home| home.join(".tally").join("config.yaml")));
        Self {
            env: Box::new(|var| std::env::var(var).ok()),
            search,
        }
    }

    /// Read variables from `lookup` instead of the process environment.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search = paths;
        self
    }

    /// The file that would be read, if any. Named files need not exist yet.
    pub fn locate(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.var(CONFIG_PATH_VAR).map(PathBuf::from))
            .or_else(|| self.search.iter().find(|p| p.exists()).cloned())
    }

    pub async fn load(&self, explicit: Option<&Path>) -> Result<TallyConfig, ConfigError> {
        let mut config = match self.locate(explicit) {
            Some(path) => Self::read(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                TallyConfig::default()
            }
        };
        self.apply_env(&mut config)?;
        validate(&config)?;
        Ok(config)
    }

    /// Parse one file, without overrides or validation.
    pub async fn read(path: &Path) -> Result<TallyConfig, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn apply_env(&self, config: &mut TallyConfig) -> Result<(), ConfigError> {
        if let Some(url) = self.var("TALLY_SITE_URL") {
            config.portal.site_url = url;
        }
        if let Some(base) = self.var("TALLY_ERP_BASE") {
            config.portal.erp_base = base;
        }
        if let Some(dir) = self.var("TALLY_DOWNLOAD_DIR") {
            config.report.download_dir = dir.into();
        }
        if let Some(value) = self.var("TALLY_RETRY_ATTEMPTS") {
            config.retry.attempts = value.trim().parse().map_err(|_| ConfigError::Env {
                var: "TALLY_RETRY_ATTEMPTS",
                value,
            })?;
        }
        if let Some(value) = self.var("TALLY_VISIBLE") {
            config.browser.visible = parse_flag("TALLY_VISIBLE", value)?;
        }
        if let Some(value) = self.var("TALLY_NETWORK_LOG") {
            config.browser.network_log = parse_flag("TALLY_NETWORK_LOG", value)?;
        }
        if let Some(dir) = self.var("TALLY_USER_DATA_DIR") {
            config.browser.user_data_dir = Some(dir.into());
        }
        if let Some(bin) = self.var("CHROME_BIN") {
            config.browser.chrome_path = Some(bin.into());
        }
        Ok(())
    }

    /// Unset and blank variables both count as absent.
    fn var(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.trim().is_empty())
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env { var, value }),
    }
}

pub fn validate(config: &TallyConfig) -> Result<(), ConfigError> {
    if config.portal.site_url.trim().is_empty() {
        return Err(ConfigError::Invalid("portal.site_url is empty".into()));
    }
    if !config.report.tab.has_report_form() {
        return Err(ConfigError::Invalid(format!(
            "report.tab {:?} has no report form",
            config.report.tab
        )));
    }
    Ok(())
}

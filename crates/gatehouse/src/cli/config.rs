//! configuration loading: defaults, then the config file, then flags.

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::{Context, Result};
use gatehouse_types::Config;
use tracing::Level;

/// default config file search paths (in order of priority).
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "/etc/gatehouse/config.toml",
    "~/.config/gatehouse/config.toml",
    "./config.toml",
];

/// instance name that means "use the machine hostname".
const DEFAULT_INSTANCE: &str = "localhost";

/// flags shared by every invocation.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// path to config file (toml format)
    #[arg(long, global = true, env = "GATEHOUSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// log level
    #[arg(long, global = true, env = "GATEHOUSE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// replication identity of this instance
    #[arg(long, global = true, env = "GATEHOUSE_INSTANCE")]
    pub instance: Option<String>,

    /// instance-wide data directory
    #[arg(long, global = true, env = "GATEHOUSE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl ConfigArgs {
    /// find and load config file, returning none if no config file is found.
    fn load_config_file(config_path: Option<&PathBuf>) -> Result<Option<Config>> {
        // an explicit path must exist
        if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {:?}", path))?;
            return Ok(Some(config));
        }

        for path_str in CONFIG_SEARCH_PATHS {
            let path = expand_tilde::expand_tilde(path_str)
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| PathBuf::from(path_str));
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file: {:?}", path))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("failed to parse config file: {:?}", path))?;
                return Ok(Some(config));
            }
        }

        Ok(None)
    }

    /// merge the config file and flags into a config.
    ///
    /// priority order: defaults -> config file -> cli flags
    pub fn into_config(self) -> Result<Config> {
        let mut config = Self::load_config_file(self.config.as_ref())?.unwrap_or_default();

        if let Some(log_level) = self.log_level {
            config.general.log_level = log_level;
        }
        if let Some(instance) = self.instance {
            config.general.instance = instance;
        }
        if let Some(data_dir) = self.data_dir {
            config.general.data_dir = data_dir;
        }

        if config.general.instance == DEFAULT_INSTANCE {
            if let Ok(name) = hostname::get() {
                config.general.instance = name.to_string_lossy().into_owned();
            }
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// map a level name to a tracing level, defaulting to info.
pub fn parse_level(raw: &str) -> Level {
    match raw.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

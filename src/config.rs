use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::browser::{LaunchOptions, DEFAULT_STARTUP_TIMEOUT};
use crate::generator::{
    GeneratorOptions, DEFAULT_LOCATOR_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY,
};
use crate::page::PageSettings;
use crate::provisioner::{ProvisionerOptions, DEFAULT_DRIVER_BASE_URL, DEFAULT_HTTP_TIMEOUT};
use crate::{H2pError, Result};

/// Settings file contents. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub page: PageSettings,
    pub driver: DriverConfig,
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub base_url: String,
    pub install_dir: Option<PathBuf>,
    pub browser_version: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DRIVER_BASE_URL.to_string(),
            install_dir: None,
            browser_version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub locator_wait: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub driver_start: Duration,
    #[serde(with = "humantime_serde")]
    pub http: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            locator_wait: DEFAULT_LOCATOR_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            driver_start: DEFAULT_STARTUP_TIMEOUT,
            http: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Config {
    /// `~/.config/h2p/config.toml`
    pub fn central_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("h2p").join("config.toml"))
    }

    /// Loads `path` when given, else the central config when it exists, else
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::central_config_path() {
                Some(central) if central.is_file() => Self::from_file(&central),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            H2pError::Config(format!("Failed to read config {}: {}", path.display(), err))
        })?;
        Self::parse(&raw)
            .map_err(|err| H2pError::Config(format!("Invalid config {}: {}", path.display(), err)))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn validate(&self) -> Result<()> {
        self.page.validate()?;
        Url::parse(&self.driver.base_url).map_err(|err| {
            H2pError::Config(format!(
                "driver.base_url '{}' is not a valid URL: {}",
                self.driver.base_url, err
            ))
        })?;
        for (name, value) in [
            ("poll_interval", self.timeouts.poll_interval),
            ("driver_start", self.timeouts.driver_start),
            ("http", self.timeouts.http),
        ] {
            if value.is_zero() {
                return Err(H2pError::Config(format!(
                    "timeouts.{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    pub fn provisioner_options(&self) -> ProvisionerOptions {
        ProvisionerOptions {
            install_dir: self.driver.install_dir.clone(),
            base_url: self.driver.base_url.clone(),
            http_timeout: self.timeouts.http,
            browser_version: self.driver.browser_version.clone(),
            force_download: false,
        }
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            locator_timeout: self.timeouts.locator_wait,
            poll_interval: self.timeouts.poll_interval,
            settle_delay: self.timeouts.settle_delay,
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            startup_timeout: self.timeouts.driver_start,
            ..LaunchOptions::default()
        }
    }
}

//! Chromedriver provisioning.
//!
//! Makes sure a chromedriver matching the installed Chrome exists before a
//! browser session is started, downloading and installing it when it is
//! missing or stale.
//!
//! # Module Structure
//!
//! - [`platform`] - Per-OS browser detection, archive names and permission steps
//! - [`repository`] - HTTP client for the driver metadata/download host
//! - [`version`] - Version candidate sequence and `--version` parsing
//!
//! # Example
//!
//! ```no_run
//! use h2p_lib::{DriverProvisioner, ProvisionerOptions};
//!
//! # async fn example() -> h2p_lib::Result<()> {
//! let provisioner = DriverProvisioner::new(ProvisionerOptions::default())?;
//! let record = provisioner.ensure_driver(None, false).await?;
//! println!("chromedriver {} at {}", record.driver_version, record.executable_path.display());
//! # Ok(())
//! # }
//! ```

pub mod platform;
pub mod repository;
pub mod version;

use async_trait::async_trait;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zip::ZipArchive;

use crate::progress::{log_progress, ProgressCallback};
use crate::{H2pError, Result};

pub use platform::PlatformAdapter;
pub use repository::{DriverRepository, DEFAULT_DRIVER_BASE_URL, DEFAULT_HTTP_TIMEOUT};
pub use version::{VersionCandidates, MAX_VERSION_ATTEMPTS};

/// Configuration for [`DriverProvisioner`].
#[derive(Debug, Clone)]
pub struct ProvisionerOptions {
    /// Directory the driver is installed into (default: current directory).
    pub install_dir: Option<PathBuf>,
    /// Base URL of the driver metadata/download host.
    pub base_url: String,
    /// Timeout applied to each HTTP request.
    pub http_timeout: Duration,
    /// Skip browser detection and match this version instead.
    pub browser_version: Option<String>,
    /// Reinstall the driver even if the installed one is current.
    pub force_download: bool,
}

impl Default for ProvisionerOptions {
    fn default() -> Self {
        Self {
            install_dir: None,
            base_url: DEFAULT_DRIVER_BASE_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            browser_version: None,
            force_download: false,
        }
    }
}

/// Outcome of provisioning: which browser was matched with which driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverVersionRecord {
    pub browser_version: String,
    pub driver_version: String,
    pub executable_path: PathBuf,
    /// Whether this call downloaded a new binary.
    pub downloaded: bool,
}

/// Source of a ready-to-use driver for the PDF generator.
#[async_trait]
pub trait DriverProvider: Send + Sync {
    async fn provision(&self) -> Result<DriverVersionRecord>;
}

pub struct DriverProvisioner {
    repository: DriverRepository,
    platform: Arc<dyn PlatformAdapter>,
    options: ProvisionerOptions,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for DriverProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverProvisioner")
            .field("repository", &self.repository)
            .field("platform", &self.platform)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DriverProvisioner {
    /// Creates a provisioner for the running OS.
    pub fn new(options: ProvisionerOptions) -> Result<Self> {
        let repository = DriverRepository::with_base_url(&options.base_url, options.http_timeout)?;
        Ok(Self::with_parts(repository, platform::detect()?, options))
    }

    pub fn with_parts(
        repository: DriverRepository,
        platform: Arc<dyn PlatformAdapter>,
        options: ProvisionerOptions,
    ) -> Self {
        Self {
            repository,
            platform,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &ProvisionerOptions {
        &self.options
    }

    pub fn install_dir(&self) -> Result<PathBuf> {
        match &self.options.install_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn executable_path(&self) -> Result<PathBuf> {
        Ok(self.install_dir()?.join(self.platform.executable_name()))
    }

    pub async fn resolve_installed_browser_version(&self) -> Result<String> {
        let version = self.platform.browser_version().await?;
        tracing::debug!(platform = self.platform.name(), %version, "detected browser");
        Ok(version)
    }

    /// Finds the newest driver published for `browser_version`, walking the
    /// [`VersionCandidates`] sequence until the host knows one of them.
    pub async fn resolve_driver_version(&self, browser_version: &str) -> Result<String> {
        for candidate in VersionCandidates::new(browser_version) {
            tracing::debug!(%candidate, "looking up LATEST_RELEASE");
            if let Some(driver_version) = self.repository.latest_release(&candidate).await? {
                tracing::info!(
                    %browser_version,
                    %candidate,
                    %driver_version,
                    "resolved driver version"
                );
                return Ok(driver_version);
            }
            tracing::warn!(%candidate, "no driver published for version prefix; retrying");
        }
        Err(H2pError::DriverVersionNotFound {
            browser_version: browser_version.to_string(),
        })
    }

    /// Ensures a driver matching `browser_version` (detected when `None`) is
    /// installed. Cheap when the installed driver is already current.
    pub async fn ensure_driver(
        &self,
        browser_version: Option<&str>,
        force_download: bool,
    ) -> Result<DriverVersionRecord> {
        let browser_version = match browser_version {
            Some(version) => version.trim().to_string(),
            None => self.resolve_installed_browser_version().await?,
        };
        log_progress(
            &self.progress,
            &format!("Chrome version {browser_version} detected"),
        );

        let driver_version = self.resolve_driver_version(&browser_version).await?;
        let target = self.executable_path()?;

        if !force_download && target.exists() {
            let capture = self.run_driver_version(&target).await?;
            let installed = version::parse_driver_version_output(&capture.stdout);
            if installed.as_deref() == Some(driver_version.as_str()) {
                tracing::debug!(
                    path = %target.display(),
                    %driver_version,
                    "driver already current"
                );
                return Ok(DriverVersionRecord {
                    browser_version,
                    driver_version,
                    executable_path: target,
                    downloaded: false,
                });
            }
            if !capture.stderr.trim().is_empty() {
                return Err(H2pError::DriverExecution(format!(
                    "Failed to execute {} --version: {}",
                    target.display(),
                    capture.stderr.trim()
                )));
            }
            tracing::info!(
                installed = installed.as_deref().unwrap_or("unknown"),
                wanted = %driver_version,
                "installed driver is stale"
            );
        }

        self.install(&driver_version, &target).await?;
        log_progress(
            &self.progress,
            &format!("ChromeDriver {driver_version} installed"),
        );

        Ok(DriverVersionRecord {
            browser_version,
            driver_version,
            executable_path: target,
            downloaded: true,
        })
    }

    async fn run_driver_version(&self, path: &Path) -> Result<platform::Capture> {
        platform::run_capture(path, &["--version"]).await.map_err(|e| {
            H2pError::DriverExecution(format!(
                "Failed to execute {} --version: {}",
                path.display(),
                e
            ))
        })
    }

    async fn install(&self, driver_version: &str, target: &Path) -> Result<()> {
        let archive_name = self.platform.archive_name();
        log_progress(
            &self.progress,
            &format!("Downloading {archive_name} ({driver_version})…"),
        );
        let archive = self
            .repository
            .download_archive(driver_version, archive_name)
            .await?;
        tracing::debug!(bytes = archive.len(), archive_name, "downloaded driver archive");

        self.platform.terminate_driver_processes().await;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry_name = self.platform.executable_name().to_string();
        let target_owned = target.to_path_buf();
        let written = tokio::task::spawn_blocking(move || {
            extract_executable(&archive, &entry_name, &target_owned)
        })
        .await
        .map_err(|e| H2pError::DriverArchive(format!("extraction task failed: {e}")))??;
        tracing::debug!(bytes = written, path = %target.display(), "extracted driver");

        self.platform.make_executable(target).await
    }
}

#[async_trait]
impl DriverProvider for DriverProvisioner {
    async fn provision(&self) -> Result<DriverVersionRecord> {
        self.ensure_driver(
            self.options.browser_version.as_deref(),
            self.options.force_download,
        )
        .await
    }
}

/// Copies the `entry_name` entry of a zip archive straight into `target`.
fn extract_executable(archive_bytes: &[u8], entry_name: &str, target: &Path) -> Result<u64> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| H2pError::DriverArchive(format!("Failed to open zip archive: {e}")))?;

    let nested_suffix = format!("/{entry_name}");
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| {
                H2pError::DriverArchive(format!("Failed to read zip entry {index}: {e}"))
            })?;
        if entry.is_dir() {
            continue;
        }
        if entry.name() == entry_name || entry.name().ends_with(&nested_suffix) {
            let mut out = fs::File::create(target)?;
            let written = std::io::copy(&mut entry, &mut out)?;
            out.sync_all()?;
            return Ok(written);
        }
    }

    Err(H2pError::DriverArchive(format!(
        "{entry_name} not found in zip archive"
    )))
}

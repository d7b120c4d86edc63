//! Per-OS details of finding Chrome and installing chromedriver.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use super::version::parse_browser_version_output;
use crate::{H2pError, Result};

/// Timeout for `--version` checks and `chmod`.
pub(crate) const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a process-termination helper may run before it is killed.
const TERMINATE_WAIT: Duration = Duration::from_millis(500);

const WINDOWS_CHROME_KEY: &str =
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\chrome.exe";
const LINUX_CHROME: &str = "google-chrome";
const MACOS_CHROME: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

#[async_trait]
pub trait PlatformAdapter: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// File name of the chromedriver archive on the download host.
    fn archive_name(&self) -> &'static str;

    /// Name of the executable inside the archive and on disk.
    fn executable_name(&self) -> &'static str;

    /// Version of the locally installed Chrome, e.g. `115.0.5790.110`.
    async fn browser_version(&self) -> Result<String>;

    /// Marks a freshly extracted driver as executable.
    async fn make_executable(&self, path: &Path) -> Result<()>;

    /// Best-effort termination of running driver processes so the binary
    /// can be overwritten.
    async fn terminate_driver_processes(&self);
}

/// Returns the adapter for the running OS.
pub fn detect() -> Result<Arc<dyn PlatformAdapter>> {
    for_os(std::env::consts::OS)
}

pub fn for_os(os: &str) -> Result<Arc<dyn PlatformAdapter>> {
    match os {
        "windows" => Ok(Arc::new(Windows)),
        "linux" => Ok(Arc::new(Linux)),
        "macos" => Ok(Arc::new(MacOs)),
        other => Err(H2pError::UnsupportedPlatform(format!(
            "'{other}' is not supported; expected windows, linux or macos"
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Windows;

#[derive(Debug, Clone, Copy)]
pub struct Linux;

#[derive(Debug, Clone, Copy)]
pub struct MacOs;

#[async_trait]
impl PlatformAdapter for Windows {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn archive_name(&self) -> &'static str {
        "chromedriver_win32.zip"
    }

    fn executable_name(&self) -> &'static str {
        "chromedriver.exe"
    }

    async fn browser_version(&self) -> Result<String> {
        let registry = run_capture("reg", &["query", WINDOWS_CHROME_KEY, "/ve"])
            .await
            .map_err(|e| H2pError::BrowserNotFound(format!("registry query failed: {e}")))?;
        let chrome_path = parse_registry_default(&registry.stdout).ok_or_else(|| {
            H2pError::BrowserNotFound("Google Chrome not found in registry".to_string())
        })?;

        let script = format!(
            "(Get-Item -LiteralPath '{}').VersionInfo.FileVersion",
            chrome_path.replace('\'', "''")
        );
        let info = run_capture("powershell", &["-NoProfile", "-Command", &script])
            .await
            .map_err(|e| H2pError::BrowserNotFound(format!("reading {chrome_path}: {e}")))?;
        parse_browser_version_output(&info.stdout).ok_or_else(|| {
            H2pError::BrowserNotFound(format!("no file version for {chrome_path}"))
        })
    }

    async fn make_executable(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn terminate_driver_processes(&self) {
        terminate_with("taskkill", &["/F", "/IM", self.executable_name(), "/T"]).await;
    }
}

#[async_trait]
impl PlatformAdapter for Linux {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn archive_name(&self) -> &'static str {
        "chromedriver_linux64.zip"
    }

    fn executable_name(&self) -> &'static str {
        "chromedriver"
    }

    async fn browser_version(&self) -> Result<String> {
        query_browser_version(LINUX_CHROME, "--product-version").await
    }

    async fn make_executable(&self, path: &Path) -> Result<()> {
        chmod_executable(path).await
    }

    async fn terminate_driver_processes(&self) {
        terminate_with("pkill", &["-x", self.executable_name()]).await;
    }
}

#[async_trait]
impl PlatformAdapter for MacOs {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn archive_name(&self) -> &'static str {
        "chromedriver_mac64.zip"
    }

    fn executable_name(&self) -> &'static str {
        "chromedriver"
    }

    async fn browser_version(&self) -> Result<String> {
        query_browser_version(MACOS_CHROME, "--version").await
    }

    async fn make_executable(&self, path: &Path) -> Result<()> {
        chmod_executable(path).await
    }

    async fn terminate_driver_processes(&self) {
        terminate_with("pkill", &["-x", self.executable_name()]).await;
    }
}

#[derive(Debug, Default)]
pub(crate) struct Capture {
    pub stdout: String,
    pub stderr: String,
}

pub(crate) async fn run_capture(
    program: impl AsRef<std::ffi::OsStr>,
    args: &[&str],
) -> std::io::Result<Capture> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = timeout(COMMAND_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timed out after {COMMAND_TIMEOUT:?}"),
            )
        })??;

    Ok(Capture {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

async fn query_browser_version(program: &str, flag: &str) -> Result<String> {
    let capture = run_capture(program, &[flag]).await.map_err(|e| {
        H2pError::BrowserNotFound(format!(
            "An error occurred trying to execute '{program} {flag}': {e}"
        ))
    })?;
    if !capture.stderr.trim().is_empty() {
        return Err(H2pError::BrowserNotFound(format!(
            "'{program} {flag}' reported: {}",
            capture.stderr.trim()
        )));
    }
    parse_browser_version_output(&capture.stdout).ok_or_else(|| {
        H2pError::BrowserNotFound(format!(
            "'{program} {flag}' printed no version: {}",
            capture.stdout.trim()
        ))
    })
}

async fn chmod_executable(path: &Path) -> Result<()> {
    let target = path.to_string_lossy();
    let capture = run_capture("chmod", &["+x", target.as_ref()]).await?;
    if !capture.stderr.trim().is_empty() {
        return Err(H2pError::DriverExecution(format!(
            "Failed to make chromedriver executable: {}",
            capture.stderr.trim()
        )));
    }
    Ok(())
}

async fn terminate_with(program: &str, args: &[&str]) {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::debug!(program, %err, "could not spawn driver termination helper");
            return;
        }
    };

    if timeout(TERMINATE_WAIT, child.wait()).await.is_err() {
        let _ = child.kill().await;
        tokio::time::sleep(TERMINATE_WAIT).await;
    }
}

/// Picks the value out of `reg query ... /ve` output:
/// `    (Default)    REG_SZ    C:\...\chrome.exe`.
fn parse_registry_default(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once("REG_SZ")?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

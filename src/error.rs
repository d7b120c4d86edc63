use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum H2pError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Browser not found: {0}")]
    BrowserNotFound(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("ChromeDriver version not found for Chrome version {browser_version}")]
    DriverVersionNotFound { browser_version: String },

    #[error("ChromeDriver download request failed with status code: {status}, reason phrase: {reason}")]
    DriverDownload { status: StatusCode, reason: String },

    #[error("ChromeDriver archive error: {0}")]
    DriverArchive(String),

    #[error("Driver execution error: {0}")]
    DriverExecution(String),

    #[error("No element matched {locator} within {timeout:?}")]
    ElementNotFound { locator: String, timeout: Duration },

    #[error("{count} elements matched {locator} after {timeout:?}; expected exactly one")]
    AmbiguousElement {
        locator: String,
        count: usize,
        timeout: Duration,
    },

    #[error("WebDriver command {command} failed: {message}")]
    WebDriver { command: String, message: String },

    #[error("Invalid print payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl H2pError {
    pub fn driver_download(status: StatusCode) -> Self {
        H2pError::DriverDownload {
            status,
            reason: status
                .canonical_reason()
                .unwrap_or("unknown reason")
                .to_string(),
        }
    }

    pub fn webdriver(command: impl Into<String>, message: impl Into<String>) -> Self {
        H2pError::WebDriver {
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            H2pError::Io(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            H2pError::Network(e) => ErrorPayload::new(
                ErrorCategory::Network,
                e.to_string(),
                "Check connectivity/proxy/VPN and retry.",
            ),
            H2pError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify URL/format (e.g., https://example.com).",
            ),
            H2pError::BrowserNotFound(msg) => ErrorPayload::new(
                ErrorCategory::Driver,
                format!("Browser not found: {msg}"),
                "Install Google Chrome, or pass --browser-version to skip detection.",
            ),
            H2pError::UnsupportedPlatform(msg) => ErrorPayload::new(
                ErrorCategory::Driver,
                format!("Unsupported platform: {msg}"),
                "Only Windows, Linux and macOS are supported.",
            ),
            H2pError::DriverVersionNotFound { .. } => ErrorPayload::new(
                ErrorCategory::Driver,
                self.to_string(),
                "Pass --browser-version with a version that has a published ChromeDriver, or point [driver].base_url at a mirror.",
            ),
            H2pError::DriverDownload { .. } | H2pError::DriverArchive(_) => ErrorPayload::new(
                ErrorCategory::Network,
                self.to_string(),
                "Retry later; use --force-download to replace a damaged driver.",
            ),
            H2pError::DriverExecution(msg) => ErrorPayload::new(
                ErrorCategory::Driver,
                format!("Driver execution error: {msg}"),
                "Rerun with --force-download to reinstall chromedriver, and make sure no other process holds the file.",
            ),
            H2pError::ElementNotFound { .. } | H2pError::AmbiguousElement { .. } => {
                ErrorPayload::new(
                    ErrorCategory::Page,
                    self.to_string(),
                    "Check the locator (-l KIND=VALUE) or increase --wait-timeout.",
                )
            }
            H2pError::WebDriver { .. } => ErrorPayload::new(
                ErrorCategory::Page,
                self.to_string(),
                "Re-run with --verbose; check that the page loads in a regular browser.",
            ),
            H2pError::Decode(e) => ErrorPayload::new(
                ErrorCategory::Page,
                format!("Invalid print payload: {e}"),
                "Re-run with --verbose; file an issue if persistent.",
            ),
            H2pError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Run with --verbose for details.",
            ),
            H2pError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("not found") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Verify the file exists; use an absolute path or run from the working directory.",
                    )
                } else if lower.contains("scale") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use a scale between 0.2 and 2.0 (e.g., -p sc=0.95).",
                    )
                } else if lower.contains("locator") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use one of ClassName, CssSelector, Id, Name, LinkText, PartialLinkText, TagName, Xpath.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths and the config file.",
                    )
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, H2pError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Io,
    Network,
    Driver,
    Page,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

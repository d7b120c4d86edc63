//! Browser automation for headless page printing.
//!
//! A print job talks to Chrome through chromedriver using `thirtyfour`; the
//! PDF itself comes from the DevTools `Page.printToPDF` command, forwarded by
//! chromedriver.
//!
//! # Module Structure
//!
//! - [`chrome`] - Chrome launcher and session
//! - [`service`] - chromedriver process lifecycle
//!
//! The [`SessionLauncher`] and [`PrintSession`] traits are the seam the
//! PDF generator is written against.

pub mod chrome;
pub mod service;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::page::PrintParams;
use crate::provisioner::DriverVersionRecord;
use crate::{LocatorSpec, Result};

pub use chrome::{
    default_chrome_args, ChromeLauncher, ChromeSession, LaunchOptions, DEFAULT_COMMAND_TIMEOUT,
    DEFAULT_STARTUP_TIMEOUT, PRINT_TO_PDF,
};
pub use service::DriverService;

/// Starts browser sessions through a provisioned driver.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: PrintSession;

    async fn launch(&self, driver: &DriverVersionRecord) -> Result<Self::Session>;
}

/// The operations a print job performs on an open browser session.
#[async_trait]
pub trait PrintSession: Send {
    async fn navigate(&mut self, url: &Url) -> Result<()>;

    /// Number of elements currently matching `locator`.
    async fn count_matches(&mut self, locator: &LocatorSpec) -> Result<usize>;

    /// Issues `Page.printToPDF` and returns the raw command result.
    async fn print_to_pdf(&mut self, params: &PrintParams) -> Result<Value>;

    /// Ends the session. Must be safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

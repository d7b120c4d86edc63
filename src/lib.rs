//! h2p library
//!
//! Converts web pages and local HTML documents to PDF by driving a headless
//! Chrome through chromedriver. The driver binary is provisioned on demand:
//! its version is matched against the installed browser and it is downloaded
//! again whenever it is missing or stale.
//!
//! # Module Overview
//!
//! - [`provisioner`] - Chromedriver version matching, download and install
//! - [`browser`] - chromedriver process, WebDriver client and print sessions
//! - [`generator`] - Print orchestration ([`PdfGenerator`])
//! - [`page`] - Page geometry and print parameters
//! - [`locator`] - Element locators used as readiness conditions
//! - [`source`] - Input documents (file, URL, in-memory HTML)
//! - [`config`] - Configuration file support
//!
//! # Example
//!
//! ```no_run
//! use h2p_lib::{DriverProvisioner, GeneratorOptions, LaunchOptions, PdfGenerator};
//! use h2p_lib::{LocatorKind, LocatorSpec, PageSettings, ProvisionerOptions};
//! use std::path::Path;
//!
//! # async fn example() -> h2p_lib::Result<()> {
//! let provisioner = DriverProvisioner::new(ProvisionerOptions::default())?;
//! let generator = PdfGenerator::chrome(
//!     provisioner,
//!     LaunchOptions::default(),
//!     GeneratorOptions::default(),
//! );
//!
//! let settings = PageSettings { landscape: true, ..PageSettings::default() };
//! let locator = LocatorSpec::new(LocatorKind::Id, "content");
//! let report = generator
//!     .convert_file(
//!         "demo/index.html",
//!         Path::new("demo.pdf"),
//!         false,
//!         Some(&locator),
//!         Some(&settings),
//!     )
//!     .await?;
//! println!("{} bytes written", report.bytes_written);
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod generator;
pub mod locator;
pub mod page;
pub mod progress;
pub mod provisioner;
pub mod source;

pub use browser::{
    ChromeLauncher, ChromeSession, LaunchOptions, PrintSession, SessionLauncher,
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_STARTUP_TIMEOUT,
};
pub use config::Config;
pub use error::{ErrorCategory, ErrorPayload, H2pError, Result};
pub use generator::{
    ConversionReport, GeneratorOptions, PdfGenerator, DEFAULT_LOCATOR_TIMEOUT,
    DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY,
};
pub use locator::{LocatorKind, LocatorParseError, LocatorSpec};
pub use page::{inches_to_mm, mm_to_inches, PageSettings, PrintParams, MM_PER_INCH};
pub use progress::ProgressCallback;
pub use provisioner::{
    DriverProvider, DriverProvisioner, DriverVersionRecord, ProvisionerOptions,
    DEFAULT_DRIVER_BASE_URL,
};
pub use source::DocumentSource;

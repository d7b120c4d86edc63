//! Headless Chrome sessions driven through chromedriver.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use url::Url;

use super::service::DriverService;
use super::{PrintSession, SessionLauncher};
use crate::page::PrintParams;
use crate::provisioner::DriverVersionRecord;
use crate::{H2pError, LocatorSpec, Result};

/// Default time allowed for chromedriver to start listening.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Default time allowed for a single WebDriver command (navigation included).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

pub const PRINT_TO_PDF: &str = "Page.printToPDF";

/// Chrome flags used for every print session.
pub fn default_chrome_args() -> Vec<String> {
    ["--headless", "--no-sandbox", "--disable-gpu", "--log-level=3"]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
}

/// Configuration options for launching browser sessions.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Arguments passed to Chrome.
    pub chrome_args: Vec<String>,
    /// Working directory of chromedriver (default: current directory).
    pub working_dir: Option<PathBuf>,
    /// Timeout for chromedriver to become ready.
    pub startup_timeout: Duration,
    /// Timeout for each WebDriver command.
    pub command_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_args: default_chrome_args(),
            working_dir: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    options: LaunchOptions,
}

impl ChromeLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self, driver: &DriverVersionRecord) -> Result<ChromeSession> {
        let working_dir = match &self.options.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let mut service = DriverService::start(
            &driver.executable_path,
            &working_dir,
            self.options.startup_timeout,
        )
        .await?;

        match ChromeSession::connect(&service.server_url(), &self.options).await {
            Ok(mut session) => {
                tracing::debug!(port = service.port(), "browser session opened");
                session.service = Some(service);
                Ok(session)
            }
            Err(err) => {
                service.stop().await;
                Err(err)
            }
        }
    }
}

/// An open WebDriver session plus the chromedriver process serving it.
#[derive(Debug)]
pub struct ChromeSession {
    driver: Option<WebDriver>,
    service: Option<DriverService>,
    command_timeout: Duration,
}

impl ChromeSession {
    /// Opens a session on an already running WebDriver server.
    pub async fn connect(server_url: &str, options: &LaunchOptions) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        for arg in &options.chrome_args {
            caps.add_arg(arg)
                .map_err(|err| H2pError::webdriver("session", err.to_string()))?;
        }
        let driver = with_timeout(
            "session",
            options.command_timeout,
            WebDriver::new(server_url, caps),
        )
        .await?;

        Ok(Self {
            driver: Some(driver),
            service: None,
            command_timeout: options.command_timeout,
        })
    }

    fn driver(&self) -> Result<&WebDriver> {
        self.driver
            .as_ref()
            .ok_or_else(|| H2pError::webdriver("session", "session already closed"))
    }
}

#[async_trait]
impl PrintSession for ChromeSession {
    async fn navigate(&mut self, url: &Url) -> Result<()> {
        let driver = self.driver()?;
        with_timeout("navigate", self.command_timeout, driver.goto(url.as_str())).await
    }

    async fn count_matches(&mut self, locator: &LocatorSpec) -> Result<usize> {
        let driver = self.driver()?;
        let elements =
            with_timeout("find elements", self.command_timeout, driver.find_all(locator.to_by()))
                .await?;
        Ok(elements.len())
    }

    async fn print_to_pdf(&mut self, params: &PrintParams) -> Result<Value> {
        let driver = self.driver()?;
        let dev_tools = ChromeDevTools::new(driver.handle.clone());
        let params = serde_json::to_value(params)?;
        with_timeout(
            PRINT_TO_PDF,
            self.command_timeout,
            dev_tools.execute_cdp_with_params(PRINT_TO_PDF, params),
        )
        .await
    }

    async fn close(&mut self) -> Result<()> {
        let result = match self.driver.take() {
            Some(driver) => with_timeout("quit", self.command_timeout, driver.quit()).await,
            None => Ok(()),
        };
        if let Some(mut service) = self.service.take() {
            service.stop().await;
        }
        result
    }
}

/// Runs one WebDriver command, naming it in any error.
async fn with_timeout<T>(
    command: &str,
    limit: Duration,
    future: impl Future<Output = WebDriverResult<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(H2pError::webdriver(command, err.to_string())),
        Err(_) => Err(H2pError::webdriver(
            command,
            format!("no response within {limit:?}"),
        )),
    }
}

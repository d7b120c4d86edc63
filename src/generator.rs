//! Print orchestration: driver readiness, session, navigation, readiness
//! wait, print and persist.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use url::Url;

use crate::browser::{ChromeLauncher, LaunchOptions, PrintSession, SessionLauncher, PRINT_TO_PDF};
use crate::page::{PageSettings, PrintParams};
use crate::progress::{log_progress, ProgressCallback};
use crate::provisioner::{DriverProvider, DriverProvisioner, DriverVersionRecord};
use crate::source::{resolve_source, DocumentSource};
use crate::{H2pError, LocatorSpec, Result};

pub const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// How long to wait for a locator to match exactly one element.
    pub locator_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause before printing when no locator is given.
    pub settle_delay: Duration,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            locator_timeout: DEFAULT_LOCATOR_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub output_path: PathBuf,
    pub bytes_written: usize,
    pub elapsed: Duration,
    pub driver: DriverVersionRecord,
}

/// Converts documents to PDF. The driver is provisioned on first use and
/// reused by every later conversion of the same generator.
pub struct PdfGenerator<P, L> {
    provider: P,
    launcher: L,
    options: GeneratorOptions,
    driver: OnceCell<DriverVersionRecord>,
    progress: Option<ProgressCallback>,
}

impl PdfGenerator<DriverProvisioner, ChromeLauncher> {
    /// Generator backed by chromedriver and headless Chrome.
    pub fn chrome(
        provisioner: DriverProvisioner,
        launch: LaunchOptions,
        options: GeneratorOptions,
    ) -> Self {
        Self::new(provisioner, ChromeLauncher::new(launch), options)
    }
}

impl<P, L> PdfGenerator<P, L>
where
    P: DriverProvider,
    L: SessionLauncher,
{
    pub fn new(provider: P, launcher: L, options: GeneratorOptions) -> Self {
        Self {
            provider,
            launcher,
            options,
            driver: OnceCell::new(),
            progress: None,
        }
    }

    /// Skips provisioning by supplying an already installed driver.
    pub fn with_driver(mut self, record: DriverVersionRecord) -> Self {
        self.driver = OnceCell::new_with(Some(record));
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// The driver record, once provisioning has happened.
    pub fn driver(&self) -> Option<&DriverVersionRecord> {
        self.driver.get()
    }

    pub async fn ensure_driver_ready(&self) -> Result<&DriverVersionRecord> {
        self.driver
            .get_or_try_init(|| async {
                log_progress(&self.progress, "Provisioning chromedriver");
                let record = self.provider.provision().await?;
                tracing::info!(
                    browser = %record.browser_version,
                    driver = %record.driver_version,
                    downloaded = record.downloaded,
                    "driver ready"
                );
                Ok::<_, H2pError>(record)
            })
            .await
    }

    pub async fn convert_file(
        &self,
        path: impl Into<PathBuf>,
        output: &Path,
        suppress_header_footer: bool,
        locator: Option<&LocatorSpec>,
        settings: Option<&PageSettings>,
    ) -> Result<ConversionReport> {
        self.convert(
            DocumentSource::File(path.into()),
            output,
            suppress_header_footer,
            locator,
            settings,
        )
        .await
    }

    pub async fn convert_url(
        &self,
        url: Url,
        output: &Path,
        suppress_header_footer: bool,
        locator: Option<&LocatorSpec>,
        settings: Option<&PageSettings>,
    ) -> Result<ConversionReport> {
        self.convert(
            DocumentSource::Url(url),
            output,
            suppress_header_footer,
            locator,
            settings,
        )
        .await
    }

    pub async fn convert_lines(
        &self,
        lines: Vec<String>,
        output: &Path,
        suppress_header_footer: bool,
        locator: Option<&LocatorSpec>,
        settings: Option<&PageSettings>,
    ) -> Result<ConversionReport> {
        self.convert(
            DocumentSource::Lines(lines),
            output,
            suppress_header_footer,
            locator,
            settings,
        )
        .await
    }

    /// Prints `source` to `output`, overwriting it. The browser session is
    /// closed on every path out of this call.
    pub async fn convert(
        &self,
        source: DocumentSource,
        output: &Path,
        suppress_header_footer: bool,
        locator: Option<&LocatorSpec>,
        settings: Option<&PageSettings>,
    ) -> Result<ConversionReport> {
        let started = Instant::now();
        let settings = settings.cloned().unwrap_or_default();
        settings.validate()?;

        let description = source.describe();
        let resolved = resolve_source(source)?;
        let driver = self.ensure_driver_ready().await?.clone();

        log_progress(&self.progress, "Starting headless browser");
        let mut session = self.launcher.launch(&driver).await?;
        let outcome = self
            .print_document(
                &mut session,
                &resolved.url,
                output,
                suppress_header_footer,
                locator,
                &settings,
            )
            .await;

        if let Err(err) = session.close().await {
            tracing::warn!(%err, "failed to close browser session");
        }
        drop(resolved);

        let bytes_written = outcome?;
        let elapsed = started.elapsed();
        tracing::info!(
            source = %description,
            output = %output.display(),
            bytes = bytes_written,
            ?elapsed,
            "pdf written"
        );
        Ok(ConversionReport {
            output_path: output.to_path_buf(),
            bytes_written,
            elapsed,
            driver,
        })
    }

    async fn print_document(
        &self,
        session: &mut L::Session,
        url: &Url,
        output: &Path,
        suppress_header_footer: bool,
        locator: Option<&LocatorSpec>,
        settings: &PageSettings,
    ) -> Result<usize> {
        log_progress(&self.progress, &format!("Loading {url}"));
        session.navigate(url).await?;

        match locator {
            Some(locator) => {
                log_progress(&self.progress, &format!("Waiting for {locator}"));
                self.wait_for_single_match(session, locator).await?;
            }
            None => tokio::time::sleep(self.options.settle_delay).await,
        }

        let params = PrintParams::from_settings(settings, suppress_header_footer);
        log_progress(&self.progress, "Printing page");
        let result = session.print_to_pdf(&params).await?;
        let pdf = decode_print_result(&result)?;

        tokio::fs::write(output, &pdf).await?;
        Ok(pdf.len())
    }

    async fn wait_for_single_match(
        &self,
        session: &mut L::Session,
        locator: &LocatorSpec,
    ) -> Result<()> {
        let timeout = self.options.locator_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            let count = session.count_matches(locator).await?;
            tracing::debug!(%locator, count, "locator poll");
            if count == 1 {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(if count == 0 {
                    H2pError::ElementNotFound {
                        locator: locator.to_string(),
                        timeout,
                    }
                } else {
                    H2pError::AmbiguousElement {
                        locator: locator.to_string(),
                        count,
                        timeout,
                    }
                });
            }
            tokio::time::sleep(self.options.poll_interval.min(deadline - now)).await;
        }
    }
}

fn decode_print_result(result: &Value) -> Result<Vec<u8>> {
    let data = result
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| H2pError::webdriver(PRINT_TO_PDF, "response has no data field"))?;
    Ok(STANDARD.decode(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::LocatorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const PDF_BYTES: &[u8] = b"%PDF-1.4\n%fake\n";

    fn record() -> DriverVersionRecord {
        DriverVersionRecord {
            browser_version: "115.0.5790.110".to_string(),
            driver_version: "114.0.5735.90".to_string(),
            executable_path: PathBuf::from("/opt/chromedriver"),
            downloaded: false,
        }
    }

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DriverProvider for CountingProvider {
        async fn provision(&self) -> Result<DriverVersionRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(H2pError::BrowserNotFound("no chrome".to_string()))
            } else {
                Ok(record())
            }
        }
    }

    #[derive(Default)]
    struct SessionLog {
        launches: usize,
        navigated: Vec<Url>,
        polls: usize,
        printed: Vec<PrintParams>,
        closed: usize,
    }

    #[derive(Clone)]
    struct Script {
        fail_navigation: bool,
        match_counts: VecDeque<usize>,
        print_result: Value,
    }

    impl Default for Script {
        fn default() -> Self {
            Self {
                fail_navigation: false,
                match_counts: VecDeque::new(),
                print_result: json!({ "data": STANDARD.encode(PDF_BYTES) }),
            }
        }
    }

    #[derive(Clone, Default)]
    struct FakeLauncher {
        log: Arc<Mutex<SessionLog>>,
        script: Script,
    }

    struct FakeSession {
        log: Arc<Mutex<SessionLog>>,
        script: Script,
    }

    #[async_trait]
    impl SessionLauncher for FakeLauncher {
        type Session = FakeSession;

        async fn launch(&self, _driver: &DriverVersionRecord) -> Result<FakeSession> {
            self.log.lock().unwrap().launches += 1;
            Ok(FakeSession {
                log: Arc::clone(&self.log),
                script: self.script.clone(),
            })
        }
    }

    #[async_trait]
    impl PrintSession for FakeSession {
        async fn navigate(&mut self, url: &Url) -> Result<()> {
            if self.script.fail_navigation {
                return Err(H2pError::webdriver("navigate", "net::ERR_NAME_NOT_RESOLVED"));
            }
            self.log.lock().unwrap().navigated.push(url.clone());
            Ok(())
        }

        async fn count_matches(&mut self, _locator: &LocatorSpec) -> Result<usize> {
            self.log.lock().unwrap().polls += 1;
            // The last scripted count repeats forever.
            let count = if self.script.match_counts.len() > 1 {
                self.script.match_counts.pop_front()
            } else {
                self.script.match_counts.front().copied()
            };
            Ok(count.unwrap_or(0))
        }

        async fn print_to_pdf(&mut self, params: &PrintParams) -> Result<Value> {
            self.log.lock().unwrap().printed.push(params.clone());
            Ok(self.script.print_result.clone())
        }

        async fn close(&mut self) -> Result<()> {
            self.log.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    fn fast_options() -> GeneratorOptions {
        GeneratorOptions {
            locator_timeout: Duration::from_millis(120),
            poll_interval: Duration::from_millis(20),
            settle_delay: Duration::from_millis(1),
        }
    }

    fn generator(
        script: Script,
    ) -> (PdfGenerator<CountingProvider, FakeLauncher>, Arc<Mutex<SessionLog>>) {
        let launcher = FakeLauncher {
            script,
            ..FakeLauncher::default()
        };
        let log = Arc::clone(&launcher.log);
        (
            PdfGenerator::new(CountingProvider::default(), launcher, fast_options()),
            log,
        )
    }

    fn html_file(dir: &Path) -> PathBuf {
        let page = dir.join("index.html");
        std::fs::write(&page, "<h1 id=\"title\">Hello</h1>").unwrap();
        page
    }

    fn price_locator() -> LocatorSpec {
        LocatorSpec::new(LocatorKind::Id, "price")
    }

    #[test]
    fn default_options() {
        let opts = GeneratorOptions::default();
        assert_eq!(opts.locator_timeout, Duration::from_secs(10));
        assert_eq!(opts.poll_interval, Duration::from_millis(500));
        assert_eq!(opts.settle_delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn converts_file_and_writes_decoded_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let output = dir.path().join("out.pdf");
        let (pdf, log) = generator(Script::default());

        let report = pdf
            .convert_file(&page, &output, false, None, None)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), PDF_BYTES);
        assert_eq!(report.bytes_written, PDF_BYTES.len());
        assert_eq!(report.output_path, output);
        assert_eq!(report.driver, record());

        let log = log.lock().unwrap();
        assert_eq!(log.navigated.len(), 1);
        assert_eq!(log.navigated[0].scheme(), "file");
        assert_eq!(log.polls, 0, "no locator means no polling");
        assert_eq!(log.closed, 1);
        assert!(log.printed[0].display_header_footer);
    }

    #[tokio::test]
    async fn provisions_driver_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let (pdf, log) = generator(Script::default());

        for name in ["a.pdf", "b.pdf"] {
            pdf.convert_file(&page, &dir.path().join(name), true, None, None)
                .await
                .unwrap();
        }

        assert_eq!(pdf.provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.lock().unwrap().launches, 2);
        assert_eq!(pdf.driver(), Some(&record()));
    }

    #[tokio::test]
    async fn supplied_driver_skips_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let (pdf, _log) = generator(Script::default());
        let pdf = pdf.with_driver(record());

        pdf.convert_file(&page, &dir.path().join("out.pdf"), false, None, None)
            .await
            .unwrap();
        assert_eq!(pdf.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provisioning_failure_opens_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let log = Arc::new(Mutex::new(SessionLog::default()));
        let launcher = FakeLauncher {
            log: Arc::clone(&log),
            script: Script::default(),
        };
        let provider = CountingProvider {
            fail: true,
            ..CountingProvider::default()
        };
        let pdf = PdfGenerator::new(provider, launcher, fast_options());

        let err = pdf
            .convert_file(&page, &dir.path().join("out.pdf"), false, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, H2pError::BrowserNotFound(_)));
        assert_eq!(log.lock().unwrap().launches, 0);
        assert!(pdf.driver().is_none());
    }

    #[tokio::test]
    async fn navigation_failure_still_closes_session() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let (pdf, log) = generator(Script {
            fail_navigation: true,
            ..Script::default()
        });

        let url = Url::parse("https://does-not-exist.invalid/").unwrap();
        let err = pdf
            .convert_url(url, &output, false, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, H2pError::WebDriver { .. }));
        assert_eq!(log.lock().unwrap().closed, 1);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn missing_element_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let output = dir.path().join("out.pdf");
        let (pdf, log) = generator(Script {
            match_counts: VecDeque::from([0]),
            ..Script::default()
        });

        let err = pdf
            .convert_file(&page, &output, false, Some(&price_locator()), None)
            .await
            .unwrap_err();

        match err {
            H2pError::ElementNotFound { locator, timeout } => {
                assert_eq!(locator, "Id=price");
                assert_eq!(timeout, Duration::from_millis(120));
            }
            other => panic!("expected ElementNotFound, got {other:?}"),
        }
        let log = log.lock().unwrap();
        assert!(log.polls >= 2, "expected repeated polling, got {}", log.polls);
        assert!(log.printed.is_empty());
        assert_eq!(log.closed, 1);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn several_matches_time_out_as_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let (pdf, log) = generator(Script {
            match_counts: VecDeque::from([2]),
            ..Script::default()
        });

        let err = pdf
            .convert_file(
                &page,
                &dir.path().join("out.pdf"),
                false,
                Some(&price_locator()),
                None,
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, H2pError::AmbiguousElement { count: 2, .. }),
            "got {err:?}"
        );
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn waits_until_exactly_one_element_matches() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let (pdf, log) = generator(Script {
            match_counts: VecDeque::from([0, 3, 1]),
            ..Script::default()
        });

        pdf.convert_file(
            &page,
            &dir.path().join("out.pdf"),
            false,
            Some(&price_locator()),
            None,
        )
        .await
        .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.polls, 3);
        assert_eq!(log.printed.len(), 1);
    }

    #[tokio::test]
    async fn landscape_settings_reach_print_command() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let (pdf, log) = generator(Script::default());
        let settings = PageSettings {
            landscape: true,
            page_ranges: Some("2-4".to_string()),
            ..PageSettings::default()
        };

        pdf.convert_file(&page, &dir.path().join("out.pdf"), true, None, Some(&settings))
            .await
            .unwrap();

        let log = log.lock().unwrap();
        let params = &log.printed[0];
        assert!((params.paper_width - 297.0 / 25.4).abs() < 1e-9);
        assert!((params.paper_height - 210.0 / 25.4).abs() < 1e-9);
        assert!(!params.display_header_footer);
        assert_eq!(params.page_ranges.as_deref(), Some("2-4"));
    }

    #[tokio::test]
    async fn invalid_settings_fail_before_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let (pdf, log) = generator(Script::default());
        let settings = PageSettings {
            scale: 5.0,
            ..PageSettings::default()
        };

        let err = pdf
            .convert_file(&page, &dir.path().join("out.pdf"), false, None, Some(&settings))
            .await
            .unwrap_err();
        assert!(matches!(err, H2pError::Config(_)));
        assert_eq!(pdf.provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(log.lock().unwrap().launches, 0);
    }

    #[tokio::test]
    async fn missing_input_file_fails_before_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let (pdf, _log) = generator(Script::default());

        let err = pdf
            .convert_file(
                dir.path().join("absent.html"),
                &dir.path().join("out.pdf"),
                false,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, H2pError::Config(ref msg) if msg.contains("not found")));
        assert_eq!(pdf.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn print_result_without_data_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let (pdf, log) = generator(Script {
            print_result: json!({ "stream": "1" }),
            ..Script::default()
        });

        let err = pdf
            .convert_file(&page, &dir.path().join("out.pdf"), false, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, H2pError::WebDriver { ref command, .. } if command == PRINT_TO_PDF));
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn lines_are_served_from_a_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let (pdf, log) = generator(Script::default());
        let lines = vec![
            "<html><body>".to_string(),
            "<p>stdin</p>".to_string(),
            "</body></html>".to_string(),
        ];

        pdf.convert_lines(lines, &dir.path().join("out.pdf"), false, None, None)
            .await
            .unwrap();

        let log = log.lock().unwrap();
        let temp = log.navigated[0].to_file_path().unwrap();
        assert_eq!(temp.extension().and_then(|e| e.to_str()), Some("html"));
        assert!(!temp.exists(), "temporary page should be gone after conversion");
    }

    #[tokio::test]
    async fn progress_messages_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let page = html_file(dir.path());
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = Arc::clone(&seen);
        let (pdf, _log) = generator(Script::default());
        let pdf = pdf.with_progress(Some(Arc::new(move |msg: &str| {
            sink.lock().unwrap().push(msg.to_string());
        })));

        pdf.convert_file(&page, &dir.path().join("out.pdf"), false, None, None)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|m| m.contains("Provisioning")));
        assert!(seen.iter().any(|m| m.contains("Printing")));
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let err = decode_print_result(&json!({ "data": "not base64!!" })).unwrap_err();
        assert!(matches!(err, H2pError::Decode(_)));
    }
}

//! Lifecycle of the chromedriver process backing a browser session.

use serde_json::Value;
use std::io;
use std::net::TcpListener;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

use crate::{H2pError, Result};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STATUS_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// A driver that dies right away usually lost its port to another process;
/// it gets one more try on a fresh port.
const START_ATTEMPTS: usize = 2;

/// A running chromedriver listening on a loopback port. The process is
/// killed when the service is stopped or dropped.
#[derive(Debug)]
pub struct DriverService {
    child: Child,
    port: u16,
}

impl DriverService {
    /// Spawns `executable` in `working_dir` and waits until it accepts
    /// sessions.
    pub async fn start(
        executable: &Path,
        working_dir: &Path,
        startup_timeout: Duration,
    ) -> Result<Self> {
        let status_client = reqwest::Client::builder()
            .no_proxy()
            .timeout(STATUS_REQUEST_TIMEOUT)
            .build()?;

        let mut attempt = 1;
        loop {
            let port = free_port()?;
            let child = spawn_driver(executable, working_dir, port)?;
            let mut service = Self { child, port };

            match service.wait_until_ready(&status_client, startup_timeout).await? {
                None => {
                    tracing::debug!(port, "chromedriver ready");
                    return Ok(service);
                }
                Some(status) if attempt < START_ATTEMPTS => {
                    tracing::warn!(port, %status, "chromedriver exited during startup; retrying");
                    attempt += 1;
                }
                Some(status) => {
                    return Err(H2pError::DriverExecution(format!(
                        "chromedriver exited during startup ({status})"
                    )));
                }
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn server_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// `Ok(None)` once the driver is ready, `Ok(Some(status))` if it exited
    /// first.
    async fn wait_until_ready(
        &mut self,
        status_client: &reqwest::Client,
        startup_timeout: Duration,
    ) -> Result<Option<ExitStatus>> {
        let deadline = Instant::now() + startup_timeout;
        let status_url = format!("{}/status", self.server_url());
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if is_ready(status_client, &status_url).await {
                return Ok(None);
            }
            if Instant::now() >= deadline {
                self.stop().await;
                return Err(H2pError::DriverExecution(format!(
                    "chromedriver did not become ready within {startup_timeout:?}"
                )));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    pub async fn stop(&mut self) {
        if let Err(err) = self.child.kill().await {
            tracing::debug!(%err, "chromedriver already gone");
        }
    }
}

/// `GET /status` reports `value.ready = true` once new sessions are accepted.
async fn is_ready(status_client: &reqwest::Client, status_url: &str) -> bool {
    let body: Value = match status_client.get(status_url).send().await {
        Ok(response) => match response.json().await {
            Ok(body) => body,
            Err(_) => return false,
        },
        Err(err) => {
            tracing::trace!(%err, "chromedriver not listening yet");
            return false;
        }
    };
    body.pointer("/value/ready")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn spawn_driver(executable: &Path, working_dir: &Path, port: u16) -> Result<Child> {
    Command::new(executable)
        .arg(format!("--port={port}"))
        .arg("--silent")
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| map_spawn_error(err, executable))
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

fn map_spawn_error(err: io::Error, executable: &Path) -> H2pError {
    if err.kind() == io::ErrorKind::NotFound {
        H2pError::DriverExecution(format!(
            "Unable to start chromedriver; '{}' was not found",
            executable.display()
        ))
    } else {
        H2pError::DriverExecution(format!(
            "Unable to start chromedriver '{}': {}",
            executable.display(),
            err
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_executable_is_a_driver_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DriverService::start(
            &dir.path().join("no-such-chromedriver"),
            dir.path(),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, H2pError::DriverExecution(ref msg) if msg.contains("not found")),
            "expected driver execution error, got {err:?}"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn driver_that_exits_early_is_retried_once_then_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("chromedriver");
        std::fs::write(&exe, "#!/bin/sh\necho \"$1\" >> runs.log\nexit 3\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = DriverService::start(&exe, dir.path(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                H2pError::DriverExecution(ref msg) if msg.contains("exited during startup")
            ),
            "expected driver execution error, got {err:?}"
        );

        let runs = std::fs::read_to_string(dir.path().join("runs.log")).unwrap();
        let ports: Vec<&str> = runs.lines().collect();
        assert_eq!(ports.len(), START_ATTEMPTS);
        assert!(ports.iter().all(|arg| arg.starts_with("--port=")));
    }

    #[tokio::test]
    async fn status_endpoint_reports_readiness() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": { "ready": true, "message": "ChromeDriver ready for new sessions." }
            })))
            .mount(&server)
            .await;
        let status_client = reqwest::Client::new();

        assert!(is_ready(&status_client, &format!("{}/status", server.uri())).await);
        assert!(!is_ready(&status_client, &format!("{}/missing", server.uri())).await);
    }
}

//! Version string helpers for matching chromedriver to the installed Chrome.

/// Maximum number of `LATEST_RELEASE_*` lookups before giving up.
pub const MAX_VERSION_ATTEMPTS: usize = 5;

/// Candidate version prefixes for the `LATEST_RELEASE_` lookup.
///
/// Each step drops the last dot-separated segment of the previous
/// candidate. Once no dot is left, the major version is decremented
/// instead (`115` is followed by `114`). The first candidate is already
/// one step removed from the full browser version.
#[derive(Debug, Clone)]
pub struct VersionCandidates {
    current: Option<String>,
    remaining: usize,
}

impl VersionCandidates {
    pub fn new(browser_version: &str) -> Self {
        Self::with_limit(browser_version, MAX_VERSION_ATTEMPTS)
    }

    pub fn with_limit(browser_version: &str, limit: usize) -> Self {
        Self {
            current: Some(browser_version.trim().to_string()),
            remaining: limit,
        }
    }
}

impl Iterator for VersionCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.remaining == 0 {
            return None;
        }
        let previous = self.current.take()?;
        let next = match previous.rfind('.') {
            Some(idx) => previous[..idx].to_string(),
            // Non-numeric majors end the sequence.
            None => previous.parse::<u32>().ok()?.checked_sub(1)?.to_string(),
        };
        self.remaining -= 1;
        self.current = Some(next.clone());
        Some(next)
    }
}

/// Extracts the version from `chromedriver --version` output, e.g.
/// `ChromeDriver 88.0.4324.96 (68dba2d8a0b149a1d3afac56fa74648032bcf46b-refs/branch-heads/4324@{#1784})`.
pub fn parse_driver_version_output(output: &str) -> Option<String> {
    output.split_whitespace().nth(1).map(str::to_string)
}

/// Normalizes a browser `--version` style output to the bare version number.
pub fn parse_browser_version_output(output: &str) -> Option<String> {
    let trimmed = output.trim();
    let version = trimmed
        .strip_prefix("Google Chrome ")
        .unwrap_or(trimmed)
        .split_whitespace()
        .next()?;
    if version.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        Some(version.to_string())
    } else {
        None
    }
}

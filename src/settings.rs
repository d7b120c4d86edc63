use std::path::{Path, PathBuf};
use std::time::Duration;

use h2p_lib::{
    Config, GeneratorOptions, H2pError, LaunchOptions, PageSettings, ProvisionerOptions,
};

use crate::cli::Cli;

/// Resolved settings after merging CLI args and config file.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub page: PageSettings,
    pub provisioner: ProvisionerOptions,
    pub generator: GeneratorOptions,
    pub launch: LaunchOptions,
}

/// Merge CLI arguments with config file, preferring CLI when flags are present.
pub fn resolve_settings(cli: &Cli, config: &Config) -> Result<ResolvedSettings, H2pError> {
    let page = apply_page_settings(config.page.clone(), &cli.page)?;
    page.validate()?;

    let mut provisioner = config.provisioner_options();
    if let Some(dir) = &cli.driver_dir {
        provisioner.install_dir = Some(dir.clone());
    }
    if let Some(version) = &cli.browser_version {
        provisioner.browser_version = Some(version.clone());
    }
    provisioner.force_download = cli.force_download;

    let mut generator = config.generator_options();
    if let Some(secs) = cli.wait_timeout {
        generator.locator_timeout = Duration::from_secs(secs);
    }

    Ok(ResolvedSettings {
        page,
        provisioner,
        generator,
        launch: config.launch_options(),
    })
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/h2p/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, H2pError> {
    let cfg = Config::load(path)?;
    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        H2pError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Appends `.pdf` unless the name already ends with it (any case).
pub fn pdf_output_path(raw: &Path) -> PathBuf {
    let name = raw.as_os_str().to_string_lossy();
    if name.to_ascii_lowercase().ends_with(".pdf") {
        raw.to_path_buf()
    } else {
        PathBuf::from(format!("{name}.pdf"))
    }
}

/// Applies `-p` values on top of `base`. Each value holds one or more
/// comma-separated settings; a comma followed by something that is not a
/// setting belongs to the previous value, so `sc=0,95` reads as 0.95.
pub fn apply_page_settings(
    mut base: PageSettings,
    raw: &[String],
) -> Result<PageSettings, H2pError> {
    for entry in raw {
        let entry = entry.strip_prefix(':').unwrap_or(entry);
        for (key, value) in split_settings(entry)? {
            apply_setting(&mut base, &key, value.as_deref())?;
        }
    }
    Ok(base)
}

const FLAG_KEYS: [&str; 2] = ["l", "landscape"];
const VALUE_KEYS: [&str; 14] = [
    "pw",
    "paperwidth",
    "ph",
    "paperheight",
    "ml",
    "marginleft",
    "ht",
    "headertemplate",
    "ft",
    "footertemplate",
    "sc",
    "scale",
    "pr",
    "pageranges",
];

fn split_settings(entry: &str) -> Result<Vec<(String, Option<String>)>, H2pError> {
    let mut settings: Vec<(String, Option<String>)> = Vec::new();
    for segment in entry.split(',') {
        if segment.trim().is_empty() {
            continue;
        }
        if let Some((key, value)) = segment.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            if VALUE_KEYS.contains(&key.as_str()) || FLAG_KEYS.contains(&key.as_str()) {
                settings.push((key, Some(value.trim().trim_matches('"').to_string())));
                continue;
            }
        } else if FLAG_KEYS.contains(&segment.trim().to_ascii_lowercase().as_str()) {
            settings.push((segment.trim().to_ascii_lowercase(), None));
            continue;
        }

        match settings.last_mut() {
            Some((_, Some(value))) => {
                value.push(',');
                value.push_str(segment.trim_end().trim_end_matches('"'));
            }
            _ => {
                return Err(H2pError::Config(format!(
                    "Unknown page setting '{}'",
                    segment.trim()
                )))
            }
        }
    }
    Ok(settings)
}

fn apply_setting(page: &mut PageSettings, key: &str, value: Option<&str>) -> Result<(), H2pError> {
    match key {
        "l" | "landscape" => {
            page.landscape = match value.map(str::to_ascii_lowercase).as_deref() {
                None | Some("") | Some("true") | Some("yes") | Some("1") => true,
                Some("false") | Some("no") | Some("0") => false,
                Some(other) => {
                    return Err(H2pError::Config(format!(
                        "Invalid landscape value '{other}' (expected true/false)"
                    )))
                }
            };
        }
        "pw" | "paperwidth" => page.paper_width = parse_decimal(key, value)?,
        "ph" | "paperheight" => page.paper_height = parse_decimal(key, value)?,
        "ml" | "marginleft" => page.margin_left = parse_decimal(key, value)?,
        "sc" | "scale" => page.scale = parse_decimal(key, value)?,
        "ht" | "headertemplate" => page.header_template = non_empty(value),
        "ft" | "footertemplate" => page.footer_template = non_empty(value),
        "pr" | "pageranges" => page.page_ranges = non_empty(value),
        other => {
            return Err(H2pError::Config(format!("Unknown page setting '{other}'")));
        }
    }
    Ok(())
}

/// Parses a decimal accepting both `.` and `,` as separator.
fn parse_decimal(key: &str, value: Option<&str>) -> Result<f64, H2pError> {
    let raw = value.unwrap_or_default().trim();
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| H2pError::Config(format!("Invalid number '{raw}' for page setting '{key}'")))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(
    settings: &ResolvedSettings,
    config_source: Option<&Path>,
) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let page = &settings.page;
    format!(
        "Effective config [{source}]: page={}x{}mm{}, margin-left={}mm, scale={:.2}, page-ranges={}, timeouts: locator={}s, poll={}ms, settle={}ms, driver-start={}s, http={}s, driver-dir={}, browser-version={}",
        page.paper_width,
        page.paper_height,
        if page.landscape { " landscape" } else { "" },
        page.margin_left,
        page.scale,
        page.page_ranges.as_deref().unwrap_or("all"),
        settings.generator.locator_timeout.as_secs(),
        settings.generator.poll_interval.as_millis(),
        settings.generator.settle_delay.as_millis(),
        settings.launch.startup_timeout.as_secs(),
        settings.provisioner.http_timeout.as_secs(),
        settings
            .provisioner
            .install_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| ".".to_string()),
        settings
            .provisioner
            .browser_version
            .as_deref()
            .unwrap_or("detected"),
    )
}

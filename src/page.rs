//! Page geometry and the `Page.printToPDF` parameter set derived from it.

use serde::{Deserialize, Serialize};

use crate::{H2pError, Result};

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

pub const MIN_SCALE: f64 = 0.2;
pub const MAX_SCALE: f64 = 2.0;

/// Declarative page layout. Dimensions are always stored in portrait
/// orientation; [`PageSettings::effective_size`] swaps them for landscape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageSettings {
    /// Print in landscape orientation (default: portrait).
    pub landscape: bool,
    /// Paper width in mm (default: 210).
    pub paper_width: f64,
    /// Paper height in mm (default: 297).
    pub paper_height: f64,
    /// Left margin in mm (default: 10).
    pub margin_left: f64,
    /// Optional header HTML; may use the print engine's placeholder classes
    /// (`date`, `title`, `url`, `pageNumber`, `totalPages`).
    pub header_template: Option<String>,
    /// Optional footer HTML.
    pub footer_template: Option<String>,
    /// Shrink/grow factor, 0.2 to 2.0 (default: 0.95).
    pub scale: f64,
    /// Optional page range expression, e.g. `1` or `2-4`.
    pub page_ranges: Option<String>,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            landscape: false,
            paper_width: 210.0,
            paper_height: 297.0,
            margin_left: 10.0,
            header_template: None,
            footer_template: None,
            scale: 0.95,
            page_ranges: None,
        }
    }
}

impl PageSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.paper_width > 0.0) || !(self.paper_height > 0.0) {
            return Err(H2pError::Config(format!(
                "Paper size must be positive (got {}x{} mm)",
                self.paper_width, self.paper_height
            )));
        }
        if !(self.margin_left >= 0.0) {
            return Err(H2pError::Config(format!(
                "Left margin must not be negative (got {} mm)",
                self.margin_left
            )));
        }
        if !(MIN_SCALE..=MAX_SCALE).contains(&self.scale) {
            return Err(H2pError::Config(format!(
                "Scale must be between {MIN_SCALE} and {MAX_SCALE} (got {})",
                self.scale
            )));
        }
        Ok(())
    }

    /// Width and height in mm as printed, honoring `landscape`.
    pub fn effective_size(&self) -> (f64, f64) {
        if self.landscape {
            (self.paper_height, self.paper_width)
        } else {
            (self.paper_width, self.paper_height)
        }
    }
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

pub fn inches_to_mm(inches: f64) -> f64 {
    inches * MM_PER_INCH
}

/// Parameters of the DevTools `Page.printToPDF` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintParams {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_left: f64,
    pub scale: f64,
    pub display_header_footer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_ranges: Option<String>,
}

impl PrintParams {
    pub fn from_settings(settings: &PageSettings, suppress_header_footer: bool) -> Self {
        let (width, height) = settings.effective_size();
        Self {
            paper_width: mm_to_inches(width),
            paper_height: mm_to_inches(height),
            margin_left: mm_to_inches(settings.margin_left),
            scale: settings.scale,
            display_header_footer: !suppress_header_footer,
            header_template: non_empty(&settings.header_template),
            footer_template: non_empty(&settings.footer_template),
            page_ranges: non_empty(&settings.page_ranges),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

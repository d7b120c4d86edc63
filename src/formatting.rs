use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::process::ExitCode;

use h2p_lib::{ConversionReport, H2pError};

/// Exit code for runtime failures.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code for argument/usage errors, shared with clap.
pub const EXIT_USAGE: u8 = 2;

/// Render an error to stderr and return the appropriate exit code.
pub fn render_error(err: &H2pError) -> ExitCode {
    eprintln!("{}", format_error(err, io::stderr().is_terminal()));
    ExitCode::from(EXIT_FAILURE)
}

/// Render a usage problem (bad input path, bad page setting) and exit like clap.
pub fn render_usage_error(err: &H2pError) -> ExitCode {
    eprintln!("{}", format_error(err, io::stderr().is_terminal()));
    eprintln!("\nFor more information, try '--help'.");
    ExitCode::from(EXIT_USAGE)
}

pub fn format_error(err: &H2pError, colorize: bool) -> String {
    let payload = err.to_payload();
    let mut buf = String::new();
    let header = color("[ERROR]", "31", colorize);
    write!(buf, "{} {}", header, payload.message).ok();
    if let Some(remediation) = &payload.remediation {
        write!(buf, "\nHint: {}", remediation).ok();
    }
    buf
}

/// One-line summary of a finished conversion.
pub fn format_report(report: &ConversionReport, colorize: bool) -> String {
    let status = color("done.", "32", colorize);
    let mut buf = format!(
        "{} {} ({} bytes in {:.1}s)",
        status,
        report.output_path.display(),
        report.bytes_written,
        report.elapsed.as_secs_f64()
    );
    if report.driver.downloaded {
        write!(buf, "; installed chromedriver {}", report.driver.driver_version).ok();
    }
    buf
}

fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

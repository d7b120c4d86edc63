use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use h2p_lib::{DocumentSource, DriverProvisioner, H2pError, PdfGenerator, ProgressCallback};

use crate::cli::Cli;
use crate::formatting::{format_report, render_error, render_usage_error};
use crate::settings::{format_effective_config, load_config, pdf_output_path, resolve_settings};

/// Run a conversion from the parsed command line.
pub async fn run_convert(cli: Cli) -> ExitCode {
    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_usage_error(&err),
    };
    let resolved = match resolve_settings(&cli, &config) {
        Ok(resolved) => resolved,
        Err(err) => return render_usage_error(&err),
    };
    if cli.verbose {
        eprintln!("{}", format_effective_config(&resolved, cli.config.as_deref()));
    }

    let output = pdf_output_path(&cli.output);
    let must_confirm = !cli.force && output.exists();
    if must_confirm && reads_stdin(&cli.source) {
        return render_usage_error(&H2pError::Config(format!(
            "{} already exists and stdin is taken by the HTML input; pass -f to overwrite",
            output.display()
        )));
    }

    let source = match read_source(&cli.source) {
        Ok(source) => source,
        Err(err) => return render_usage_error(&err),
    };

    if must_confirm {
        match confirm_overwrite(&output) {
            Ok(true) => {}
            Ok(false) => {
                println!("Operation aborted.");
                return ExitCode::SUCCESS;
            }
            Err(err) => return render_error(&H2pError::Io(err)),
        }
    }

    let progress: Option<ProgressCallback> = if cli.verbose {
        Some(Arc::new(|message: &str| eprintln!("{message}")))
    } else {
        None
    };
    let provisioner = match DriverProvisioner::new(resolved.provisioner) {
        Ok(provisioner) => provisioner.with_progress(progress.clone()),
        Err(err) => return render_error(&err),
    };
    let generator = PdfGenerator::chrome(provisioner, resolved.launch, resolved.generator)
        .with_progress(progress);

    println!("Generating PDF {}", output.display());
    match generator
        .convert(
            source,
            &output,
            cli.no_header_footer,
            cli.locator.as_ref(),
            Some(&resolved.page),
        )
        .await
    {
        Ok(report) => {
            println!("{}", format_report(&report, io::stdout().is_terminal()));
            ExitCode::SUCCESS
        }
        Err(err) => render_error(&err),
    }
}

/// `-` reads HTML lines from stdin; anything else must be a URL or an
/// existing file.
fn read_source(raw: &str) -> Result<DocumentSource, H2pError> {
    if reads_stdin(raw) {
        let lines = io::stdin().lock().lines().collect::<io::Result<Vec<String>>>()?;
        return Ok(DocumentSource::Lines(lines));
    }
    let source = DocumentSource::parse(raw)?;
    if let DocumentSource::File(path) = &source {
        if !path.is_file() {
            return Err(H2pError::Config(format!(
                "File '{}' not found",
                path.display()
            )));
        }
    }
    Ok(source)
}

fn reads_stdin(raw: &str) -> bool {
    raw.trim() == "-"
}

fn confirm_overwrite(output: &Path) -> io::Result<bool> {
    print!("overwrite {} y(es)|N(o)? ", output.display());
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;

use crate::{H2pError, Result};

/// A navigable document: a local file, a remote URL or HTML lines held in
/// memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Url(Url),
    Lines(Vec<String>),
}

impl DocumentSource {
    /// Classifies a command-line argument: `http(s)://` URLs become
    /// [`DocumentSource::Url`], everything else a local file.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            Ok(DocumentSource::Url(Url::parse(value)?))
        } else {
            Ok(DocumentSource::File(PathBuf::from(value)))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DocumentSource::File(path) => path.display().to_string(),
            DocumentSource::Url(url) => url.to_string(),
            DocumentSource::Lines(lines) => format!("{} lines of HTML", lines.len()),
        }
    }
}

/// A source turned into an absolute URI. Sources materialized to a
/// temporary file keep it alive here until the conversion is done.
#[derive(Debug)]
pub struct ResolvedSource {
    pub url: Url,
    temp_file: Option<NamedTempFile>,
}

impl ResolvedSource {
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp_file.as_ref().map(|file| file.path())
    }
}

pub fn resolve_source(source: DocumentSource) -> Result<ResolvedSource> {
    match source {
        DocumentSource::Url(url) => Ok(ResolvedSource {
            url,
            temp_file: None,
        }),
        DocumentSource::File(path) => Ok(ResolvedSource {
            url: file_url(&path)?,
            temp_file: None,
        }),
        DocumentSource::Lines(lines) => {
            let mut file = tempfile::Builder::new()
                .prefix("h2p-")
                .suffix(".html")
                .tempfile()?;
            for line in &lines {
                writeln!(file, "{line}")?;
            }
            file.flush()?;
            Ok(ResolvedSource {
                url: file_url(file.path())?,
                temp_file: Some(file),
            })
        }
    }
}

fn file_url(path: &Path) -> Result<Url> {
    if !path.exists() {
        return Err(H2pError::Config(format!(
            "File '{}' not found",
            path.display()
        )));
    }
    let absolute = fs::canonicalize(path)?;
    Url::from_file_path(&absolute).map_err(|_| {
        H2pError::Config(format!(
            "Cannot express '{}' as a file URL",
            absolute.display()
        ))
    })
}

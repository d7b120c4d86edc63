use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thirtyfour::By;
use thiserror::Error;

/// Strategy used to find the element that gates printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorKind {
    ClassName,
    CssSelector,
    Id,
    Name,
    LinkText,
    PartialLinkText,
    TagName,
    XPath,
}

impl LocatorKind {
    pub const ALL: [LocatorKind; 8] = [
        LocatorKind::ClassName,
        LocatorKind::CssSelector,
        LocatorKind::Id,
        LocatorKind::Name,
        LocatorKind::LinkText,
        LocatorKind::PartialLinkText,
        LocatorKind::TagName,
        LocatorKind::XPath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorKind::ClassName => "ClassName",
            LocatorKind::CssSelector => "CssSelector",
            LocatorKind::Id => "Id",
            LocatorKind::Name => "Name",
            LocatorKind::LinkText => "LinkText",
            LocatorKind::PartialLinkText => "PartialLinkText",
            LocatorKind::TagName => "TagName",
            LocatorKind::XPath => "Xpath",
        }
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorParseError {
    #[error("Invalid locator format: expected KIND=VALUE (e.g., Id=price)")]
    InvalidFormat,
    #[error("Unknown locator-type '{0}'")]
    UnknownKind(String),
}

impl FromStr for LocatorKind {
    type Err = LocatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        LocatorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| LocatorParseError::UnknownKind(s.trim().to_string()))
    }
}

/// A DOM condition to wait for before printing: exactly one element must
/// match `value` interpreted according to `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorSpec {
    pub kind: LocatorKind,
    pub value: String,
}

impl LocatorSpec {
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// The WebDriver lookup strategy for this locator.
    pub fn to_by(&self) -> By {
        let value = self.value.as_str();
        match self.kind {
            LocatorKind::ClassName => By::ClassName(value),
            LocatorKind::CssSelector => By::Css(value),
            LocatorKind::Id => By::Id(value),
            LocatorKind::Name => By::Name(value),
            LocatorKind::LinkText => By::LinkText(value),
            LocatorKind::PartialLinkText => By::PartialLinkText(value),
            LocatorKind::TagName => By::Tag(value),
            LocatorKind::XPath => By::XPath(value),
        }
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

impl FromStr for LocatorSpec {
    type Err = LocatorParseError;

    /// Parses `KIND=VALUE`; only the first `=` separates, so XPath
    /// predicates such as `//div[@class='a']` survive intact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s.split_once('=').ok_or(LocatorParseError::InvalidFormat)?;
        let value = strip_quotes(value.trim());
        if kind.trim().is_empty() || value.is_empty() {
            return Err(LocatorParseError::InvalidFormat);
        }
        Ok(LocatorSpec {
            kind: kind.parse()?,
            value: value.to_string(),
        })
    }
}

/// Removes one pair of surrounding double quotes, if present.
fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

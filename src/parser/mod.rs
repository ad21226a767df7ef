//! Manifest parsers.
//!
//! This module provides the [`ManifestParser`] trait and implementations that
//! turn raw manifest text into normalized [`Dependency`] records.
//!
//! # Available Parsers
//!
//! | Parser | Ecosystem | Manifest |
//! |--------|-----------|----------|
//! | [`RequirementsParser`] | Python | `requirements.txt` |
//! | [`PackageJsonParser`] | Node.js | `package.json` |
//!
//! Parsing never fails. Lines or entries that cannot be interpreted are
//! skipped and reported as [`ParseWarning`]s alongside the dependencies that
//! could be read.
//!
//! # Example
//!
//! ```
//! use depscan::{parser, Ecosystem};
//!
//! let outcome = parser::parse("flask==2.2.0\nrequests\n", Ecosystem::Python);
//! assert_eq!(outcome.dependencies.len(), 2);
//! assert_eq!(outcome.dependencies[0].version_specifier(), "2.2.0");
//! assert_eq!(outcome.dependencies[1].version_specifier(), "latest");
//! ```

mod package_json;
mod requirements;

pub use package_json::PackageJsonParser;
pub use requirements::RequirementsParser;

use crate::model::{Dependency, Ecosystem};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static EXACT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"==\s*([^\s,;]+)").expect("valid regex"));
static MINIMUM_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">=\s*([^\s,;]+)").expect("valid regex"));
static ANY_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+(?:\.[0-9]+)*(?:[a-zA-Z][0-9]*)?)").expect("valid regex")
});

/// A manifest line or entry that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line number, when the manifest format has meaningful lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub raw: String,
    pub reason: String,
}

impl ParseWarning {
    pub fn new(line: Option<usize>, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line,
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: '{}' ({})", line, self.raw, self.reason),
            None => write!(f, "'{}' ({})", self.raw, self.reason),
        }
    }
}

/// Dependencies read from a manifest plus everything that was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub dependencies: Vec<Dependency>,
    pub warnings: Vec<ParseWarning>,
}

/// Trait for turning one manifest dialect into dependencies.
pub trait ManifestParser: Send + Sync {
    /// Returns the human-readable name of this parser.
    fn name(&self) -> &'static str;

    /// Returns the ecosystem this parser handles.
    fn ecosystem(&self) -> Ecosystem;

    /// Parses manifest text. Never fails; problems become warnings.
    fn parse(&self, content: &str) -> ParseOutcome;
}

/// Returns the parser for a specific ecosystem.
///
/// ```
/// use depscan::{parser::get_parser, Ecosystem};
///
/// let parser = get_parser(Ecosystem::Node);
/// assert_eq!(parser.name(), "package.json");
/// ```
pub fn get_parser(ecosystem: Ecosystem) -> Box<dyn ManifestParser> {
    match ecosystem {
        Ecosystem::Python => Box::new(RequirementsParser),
        Ecosystem::Node => Box::new(PackageJsonParser),
    }
}

/// Parses `content` with the parser for `ecosystem`.
pub fn parse(content: &str, ecosystem: Ecosystem) -> ParseOutcome {
    get_parser(ecosystem).parse(content)
}

/// Best-effort single version from a version specifier.
///
/// Looks for an exact `==` pin, then a `>=` lower bound, then any numeric
/// dotted token.
pub fn extract_version(specifier: &str) -> Option<String> {
    let specifier = specifier.trim();
    if specifier.is_empty() || specifier == crate::model::LATEST {
        return None;
    }

    [&*EXACT_VERSION, &*MINIMUM_VERSION, &*ANY_VERSION]
        .iter()
        .find_map(|re| re.captures(specifier))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

use super::{ManifestParser, ParseOutcome, ParseWarning};
use crate::model::{Dependency, Ecosystem, LATEST};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Dependency sections that are scanned. Later sections win on duplicate names.
const SECTIONS: [&str; 2] = ["dependencies", "devDependencies"];

/// Parser for `package.json` manifest objects.
pub struct PackageJsonParser;

impl PackageJsonParser {
    /// Strips npm range operators, keeping the first version of a range.
    fn normalize_version(raw: &str) -> String {
        let cleaned = raw
            .trim()
            .trim_start_matches(&['^', '~', '>', '=', '<', '*'][..])
            .trim();
        let cleaned = cleaned.split_whitespace().next().unwrap_or("");

        if cleaned.is_empty() || cleaned == "*" || cleaned.eq_ignore_ascii_case(LATEST) {
            LATEST.to_string()
        } else {
            cleaned.to_string()
        }
    }
}

impl ManifestParser for PackageJsonParser {
    fn name(&self) -> &'static str {
        "package.json"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Node
    }

    fn parse(&self, content: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        let manifest: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "package.json is not valid JSON");
                outcome.warnings.push(ParseWarning::new(
                    Some(e.line()),
                    "package.json",
                    format!("invalid JSON: {}", e),
                ));
                return outcome;
            }
        };

        let Some(manifest) = manifest.as_object() else {
            outcome.warnings.push(ParseWarning::new(
                None,
                "package.json",
                "manifest is not a JSON object",
            ));
            return outcome;
        };

        let mut merged: BTreeMap<String, String> = BTreeMap::new();

        for section in SECTIONS {
            let Some(value) = manifest.get(section) else {
                continue;
            };
            let Some(entries) = value.as_object() else {
                outcome.warnings.push(ParseWarning::new(
                    None,
                    section,
                    "dependency section is not an object",
                ));
                continue;
            };

            for (name, version) in entries {
                match version.as_str() {
                    Some(version) => {
                        merged.insert(name.clone(), Self::normalize_version(version));
                    }
                    None => {
                        warn!(package = %name, section, "non-string version in package.json");
                        outcome.warnings.push(ParseWarning::new(
                            None,
                            format!("\"{}\": {}", name, version),
                            "version is not a string",
                        ));
                    }
                }
            }
        }

        outcome.dependencies = merged
            .into_iter()
            .map(|(name, version)| Dependency::new(name, Ecosystem::Node, version))
            .collect();

        outcome
    }
}

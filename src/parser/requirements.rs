use super::{ManifestParser, ParseOutcome, ParseWarning};
use crate::model::{Dependency, Ecosystem, LATEST};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid regex"));

/// Two-character operators come first so `>=` is not read as `>`.
const OPERATORS: [&str; 7] = ["==", "~=", ">=", "<=", "!=", ">", "<"];

/// Lines installed from version control or in editable mode are not scanned.
const SKIPPED_PREFIXES: [&str; 6] = ["git+", "hg+", "svn+", "bzr+", "-e", "--editable"];

/// Parser for `requirements.txt` pinned lists.
pub struct RequirementsParser;

enum Line {
    Skip,
    Dependency(Dependency),
    Invalid(&'static str),
}

impl RequirementsParser {
    fn parse_line(line: &str) -> Line {
        if line.is_empty() || line.starts_with('#') {
            return Line::Skip;
        }
        if SKIPPED_PREFIXES.iter().any(|p| line.starts_with(p)) || line.contains("://") {
            debug!(line, "skipping source-control or editable requirement");
            return Line::Skip;
        }
        // Other pip options (-r, --index-url, ...) are not dependencies.
        if line.starts_with('-') {
            return Line::Skip;
        }

        let requirement = line
            .split('#')
            .next()
            .unwrap_or(line)
            .split(';')
            .next()
            .unwrap_or(line)
            .trim();

        let (name_part, version) = match requirement.find(&['=', '~', '>', '<', '!'][..]) {
            Some(idx) => {
                let rest = &requirement[idx..];
                let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                    return Line::Invalid("unrecognized version operator");
                };
                let version = rest[op.len()..].trim_start_matches('=').trim();
                if version.is_empty() {
                    return Line::Invalid("missing version after operator");
                }
                (&requirement[..idx], version)
            }
            None => (requirement, LATEST),
        };

        let name = name_part.split('[').next().unwrap_or(name_part).trim();
        if !PACKAGE_NAME.is_match(name) {
            return Line::Invalid("invalid package name");
        }

        Line::Dependency(Dependency::new(name, Ecosystem::Python, version))
    }
}

impl ManifestParser for RequirementsParser {
    fn name(&self) -> &'static str {
        "requirements.txt"
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    fn parse(&self, content: &str) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();

        for (idx, raw) in content.lines().enumerate() {
            match Self::parse_line(raw.trim()) {
                Line::Skip => {}
                Line::Dependency(dep) => outcome.dependencies.push(dep),
                Line::Invalid(reason) => {
                    let warning = ParseWarning::new(Some(idx + 1), raw.trim(), reason);
                    warn!(%warning, "could not parse requirement");
                    outcome.warnings.push(warning);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ParseOutcome {
        RequirementsParser.parse(content)
    }

    #[test]
    fn test_exact_pin() {
        let outcome = parse("flask==2.2.0");
        assert_eq!(outcome.dependencies.len(), 1);
        let dep = &outcome.dependencies[0];
        assert_eq!(dep.name(), "flask");
        assert_eq!(dep.version_specifier(), "2.2.0");
        assert_eq!(dep.resolved_version(), Some("2.2.0"));
        assert_eq!(dep.ecosystem(), Ecosystem::Python);
    }

    #[test]
    fn test_no_operator_is_latest() {
        let outcome = parse("requests");
        assert_eq!(outcome.dependencies[0].name(), "requests");
        assert_eq!(outcome.dependencies[0].version_specifier(), "latest");
        assert_eq!(outcome.dependencies[0].resolved_version(), None);
    }

    #[test]
    fn test_inline_comment_stripped() {
        let outcome = parse("flask==2.2.0#pin\nrequests  # http client\ndjango>=4.2 ; python_version >= '3.8' # lts");
        assert!(outcome.warnings.is_empty());
        let pairs: Vec<(&str, &str)> = outcome
            .dependencies
            .iter()
            .map(|d| (d.name(), d.version_specifier()))
            .collect();
        assert_eq!(
            pairs,
            vec![("flask", "2.2.0"), ("requests", "latest"), ("django", "4.2")]
        );
    }

    #[test]
    fn test_all_operators() {
        let outcome = parse("a==1.0\nb>=2.0\nc>3.0\nd<=4.0\ne<5.0\nf~=6.0\ng!=7.0");
        let pairs: Vec<(&str, &str)> = outcome
            .dependencies
            .iter()
            .map(|d| (d.name(), d.version_specifier()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a", "1.0"),
                ("b", "2.0"),
                ("c", "3.0"),
                ("d", "4.0"),
                ("e", "5.0"),
                ("f", "6.0"),
                ("g", "7.0"),
            ]
        );
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_extras_and_markers_stripped() {
        let outcome = parse(
            "requests[security,socks]>=2.28.0\nimportlib-metadata==6.0; python_version < \"3.8\"\nuvicorn[standard]",
        );
        let deps = &outcome.dependencies;
        assert_eq!(deps[0].name(), "requests");
        assert_eq!(deps[0].version_specifier(), "2.28.0");
        assert_eq!(deps[1].name(), "importlib-metadata");
        assert_eq!(deps[1].version_specifier(), "6.0");
        assert_eq!(deps[2].name(), "uvicorn");
        assert_eq!(deps[2].version_specifier(), "latest");
    }

    #[test]
    fn test_comments_blank_and_vcs_lines_skipped() {
        let content = "\
# web stack
flask==2.2.0

-e git+https://github.com/org/project.git#egg=project
git+https://github.com/org/other.git
hg+https://example.org/repo
--index-url https://pypi.org/simple
-r base.txt
django>=4.2  # LTS
";
        let outcome = parse(content);
        let names: Vec<&str> = outcome.dependencies.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["flask", "django"]);
        assert_eq!(outcome.dependencies[1].version_specifier(), "4.2");
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_range_keeps_full_specifier() {
        let outcome = parse("numpy>=1.21,<2.0");
        let dep = &outcome.dependencies[0];
        assert_eq!(dep.version_specifier(), "1.21,<2.0");
        assert_eq!(dep.resolved_version(), Some("1.21"));
    }

    #[test]
    fn test_malformed_lines_become_warnings() {
        let outcome = parse("flask==2.2.0\nbad name==1.0\ndjango==\npkg=1.0\nrequests");
        let names: Vec<&str> = outcome.dependencies.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["flask", "requests"]);

        let lines: Vec<Option<usize>> = outcome.warnings.iter().map(|w| w.line).collect();
        assert_eq!(lines, vec![Some(2), Some(3), Some(4)]);
        assert_eq!(outcome.warnings[0].raw, "bad name==1.0");
        assert_eq!(outcome.warnings[1].reason, "missing version after operator");
        assert_eq!(outcome.warnings[2].reason, "unrecognized version operator");
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let content = "flask==2.2.0\nrequests==2.31.0\nJinja2==3.1.2\n";
        assert_eq!(parse(content), parse(content));
    }

    #[test]
    fn test_name_case_preserved() {
        let outcome = parse("PyYAML==6.0");
        assert_eq!(outcome.dependencies[0].name(), "PyYAML");
        assert!(outcome.dependencies[0].matches_name("pyyaml"));
    }
}

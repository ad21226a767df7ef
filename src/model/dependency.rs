use serde::{Deserialize, Serialize};
use std::path::Path;

/// Version specifier used when a manifest entry does not pin a version.
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// `requirements.txt` style pinned lists.
    Python,
    /// `package.json` style manifest objects.
    Node,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Python => "python",
            Ecosystem::Node => "node",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ecosystem::Python => "Python",
            Ecosystem::Node => "Node.js",
        }
    }

    /// Guesses the ecosystem from a manifest file name.
    ///
    /// ```
    /// use depscan::Ecosystem;
    ///
    /// assert_eq!(Ecosystem::from_filename("requirements-dev.txt"), Some(Ecosystem::Python));
    /// assert_eq!(Ecosystem::from_filename("web/package.json"), Some(Ecosystem::Node));
    /// assert_eq!(Ecosystem::from_filename("Cargo.toml"), None);
    /// ```
    pub fn from_filename(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_lowercase();

        if name == "package.json" {
            return Some(Ecosystem::Node);
        }
        if (name.starts_with("requirements") && name.ends_with(".txt")) || name.ends_with(".in") {
            return Some(Ecosystem::Python);
        }
        None
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "pip" | "pypi" => Ok(Ecosystem::Python),
            "node" | "npm" | "nodejs" => Ok(Ecosystem::Node),
            _ => Err(format!("Unknown ecosystem: {}. Use 'python' or 'node'", s)),
        }
    }
}

/// A package declared in a manifest.
///
/// Dependencies are created by the manifest parsers and are read-only
/// afterwards; the pipeline only ever borrows or clones them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    name: String,
    ecosystem: Ecosystem,
    version_specifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_version: Option<String>,
}

impl Dependency {
    /// Creates a dependency, deriving `resolved_version` from the specifier.
    pub fn new(
        name: impl Into<String>,
        ecosystem: Ecosystem,
        version_specifier: impl Into<String>,
    ) -> Self {
        let version_specifier = version_specifier.into();
        let resolved_version = crate::parser::extract_version(&version_specifier);
        Self {
            name: name.into(),
            ecosystem,
            version_specifier,
            resolved_version,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    pub fn version_specifier(&self) -> &str {
        &self.version_specifier
    }

    pub fn resolved_version(&self) -> Option<&str> {
        self.resolved_version.as_deref()
    }

    /// Names are kept as declared but compared case-insensitively.
    pub fn matches_name(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// The keyword used when querying the vulnerability database.
    ///
    /// Scoped npm packages (`@types/node`) are searched by their bare name.
    pub fn query_name(&self) -> &str {
        match self.name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
            Some((_, bare)) if !bare.is_empty() => bare,
            _ => &self.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_resolves_version() {
        let dep = Dependency::new("flask", Ecosystem::Python, ">=2.0,<3.0");
        assert_eq!(dep.resolved_version(), Some("2.0"));

        let dep = Dependency::new("requests", Ecosystem::Python, LATEST);
        assert_eq!(dep.resolved_version(), None);
    }

    #[test]
    fn test_matches_name_case_insensitive() {
        let dep = Dependency::new("Django", Ecosystem::Python, "4.2");
        assert!(dep.matches_name("django"));
        assert!(dep.matches_name("DJANGO"));
        assert!(!dep.matches_name("flask"));
        assert_eq!(dep.name(), "Django");
    }

    #[test]
    fn test_query_name_strips_npm_scope() {
        let dep = Dependency::new("@types/node", Ecosystem::Node, "20.0.0");
        assert_eq!(dep.query_name(), "node");

        let dep = Dependency::new("lodash", Ecosystem::Node, "4.17.21");
        assert_eq!(dep.query_name(), "lodash");

        let dep = Dependency::new("@broken", Ecosystem::Node, "1.0.0");
        assert_eq!(dep.query_name(), "@broken");
    }

    #[test]
    fn test_ecosystem_from_str() {
        assert_eq!("npm".parse::<Ecosystem>(), Ok(Ecosystem::Node));
        assert_eq!("Python".parse::<Ecosystem>(), Ok(Ecosystem::Python));
        assert!("cargo".parse::<Ecosystem>().is_err());
    }

    #[test]
    fn test_ecosystem_from_filename() {
        assert_eq!(
            Ecosystem::from_filename("requirements.txt"),
            Some(Ecosystem::Python)
        );
        assert_eq!(Ecosystem::from_filename("deps.in"), Some(Ecosystem::Python));
        assert_eq!(Ecosystem::from_filename("package.json"), Some(Ecosystem::Node));
        assert_eq!(Ecosystem::from_filename("package-lock.json"), None);
    }
}

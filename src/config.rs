//! Configuration file handling.
//!
//! This module provides loading and saving of depscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/depscan/config.toml`
//! - macOS: `~/Library/Application Support/depscan/config.toml`
//! - Windows: `%APPDATA%\depscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! nvd_base_url = "https://services.nvd.nist.gov/rest/json/cves/2.0"
//! results_per_page = 10
//! request_timeout_secs = 30
//! retry_backoff_secs = 10
//! pacing_delay_ms = 2000
//! concurrency = 1
//! default_format = "table"
//!
//! [rate_limit]
//! capacity = 5
//! window_secs = 30
//!
//! [ignore]
//! packages = ["pytest*", "@types/*"]
//! vulnerabilities = ["CVE-2021-12345"]
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ratelimit::RateLimitConfig;
use crate::source::DEFAULT_NVD_URL;

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "NVD_API_KEY";

/// Application configuration.
///
/// This struct represents all configurable options for depscan.
/// It can be loaded from a TOML file or created with default values.
///
/// # Example
///
/// ```no_run
/// use depscan::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Pacing delay: {} ms", config.pacing_delay_ms);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Endpoint of the NVD CVE API.
    pub nvd_base_url: String,

    /// NVD API key. The `NVD_API_KEY` environment variable takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Maximum records requested per package search.
    ///
    /// Default: 10
    pub results_per_page: u32,

    /// Per-request timeout, in seconds.
    ///
    /// Default: 30
    pub request_timeout_secs: u64,

    /// How long to wait before retrying a throttled request, in seconds.
    ///
    /// Default: 10
    pub retry_backoff_secs: u64,

    /// Courtesy delay between dependencies, in milliseconds.
    ///
    /// Default: 2000
    pub pacing_delay_ms: u64,

    /// Number of dependencies looked up at once. All lookups share one
    /// rate-limit budget.
    ///
    /// Default: 1
    pub concurrency: usize,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json"
    /// Default: "table"
    pub default_format: String,

    /// Overrides the rate-limit preset chosen from the API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    /// Ignore list configuration for suppressing known issues.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Configuration for ignoring specific packages or vulnerabilities.
///
/// Use this to suppress known false positives or accepted risks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names to exclude from scanning.
    ///
    /// Matching is case-insensitive and supports `*` wildcards
    /// (e.g. "pytest*", "@types/*").
    pub packages: Vec<String>,

    /// Vulnerability IDs to ignore (e.g., "CVE-2021-12345").
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    /// Check if a package should be ignored.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.packages
            .iter()
            .any(|pattern| glob_match(&pattern.to_lowercase(), &name))
    }

    /// Check if a vulnerability should be ignored.
    pub fn should_ignore_vulnerability(&self, vuln_id: &str) -> bool {
        self.vulnerabilities
            .iter()
            .any(|id| id.eq_ignore_ascii_case(vuln_id))
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    let first = parts[0];
    if !remaining.starts_with(first) {
        return false;
    }
    remaining = &remaining[first.len()..];

    let last = parts[parts.len() - 1];
    if !remaining.ends_with(last) {
        return false;
    }
    remaining = &remaining[..remaining.len() - last.len()];

    for part in parts[1..parts.len() - 1].iter().filter(|p| !p.is_empty()) {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nvd_base_url: DEFAULT_NVD_URL.to_string(),
            api_key: None,
            results_per_page: 10,
            request_timeout_secs: 30,
            retry_backoff_secs: 10,
            pacing_delay_ms: 2000,
            concurrency: 1,
            default_format: "table".to_string(),
            rate_limit: None,
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Saves the configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// The API key to use: `NVD_API_KEY` first, then the config file.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    /// The configured rate limit, or the preset for the credential state.
    pub fn rate_limit_for(&self, has_key: bool) -> RateLimitConfig {
        self.rate_limit
            .unwrap_or_else(|| RateLimitConfig::for_credential(has_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("lodash", "lodash"));
        assert!(!glob_match("lodash", "underscore"));
    }

    #[test]
    fn test_glob_match_prefix() {
        assert!(glob_match("pytest*", "pytest"));
        assert!(glob_match("pytest*", "pytest-cov"));
        assert!(!glob_match("pytest*", "flask"));
    }

    #[test]
    fn test_glob_match_suffix_and_contains() {
        assert!(glob_match("*-stubs", "types-requests-stubs"));
        assert!(!glob_match("*-stubs", "requests"));
        assert!(glob_match("*lodash*", "my-lodash-plugin"));
    }

    #[test]
    fn test_glob_match_scoped() {
        assert!(glob_match("@types/*", "@types/node"));
        assert!(!glob_match("@types/*", "@babel/core"));
    }

    #[test]
    fn test_ignore_config_packages_case_insensitive() {
        let config = IgnoreConfig {
            packages: vec!["Flask".to_string(), "@types/*".to_string()],
            vulnerabilities: vec![],
        };

        assert!(config.should_ignore_package("flask"));
        assert!(config.should_ignore_package("@types/react"));
        assert!(!config.should_ignore_package("django"));
    }

    #[test]
    fn test_ignore_config_vulnerabilities() {
        let config = IgnoreConfig {
            packages: vec![],
            vulnerabilities: vec!["CVE-2021-12345".to_string()],
        };

        assert!(config.should_ignore_vulnerability("CVE-2021-12345"));
        assert!(config.should_ignore_vulnerability("cve-2021-12345"));
        assert!(!config.should_ignore_vulnerability("CVE-2022-99999"));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.nvd_base_url, DEFAULT_NVD_URL);
        assert_eq!(config.results_per_page, 10);
        assert_eq!(config.pacing_delay_ms, 2000);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.default_format, "table");
        assert!(config.rate_limit.is_none());
        assert!(config.ignore.packages.is_empty());
    }

    #[test]
    fn test_rate_limit_override() {
        let mut config = Config::default();
        assert_eq!(config.rate_limit_for(false), RateLimitConfig::anonymous());
        assert_eq!(config.rate_limit_for(true), RateLimitConfig::with_key());

        config.rate_limit = Some(RateLimitConfig {
            capacity: 2,
            window_secs: 60,
        });
        assert_eq!(config.rate_limit_for(true).capacity, 2);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.pacing_delay_ms = 0;
        config.ignore.vulnerabilities = vec!["CVE-2020-1".to_string()];
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.pacing_delay_ms, 0);
        assert_eq!(loaded.ignore.vulnerabilities, vec!["CVE-2020-1"]);
        assert!(loaded.api_key.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = 4\n[rate_limit]\ncapacity = 50\nwindow_secs = 30\n")
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.rate_limit, Some(RateLimitConfig::with_key()));
        assert_eq!(config.results_per_page, 10);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_format, "table");
    }
}

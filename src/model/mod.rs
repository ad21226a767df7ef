//! Core data types for dependencies, vulnerabilities, and scan reports.
//!
//! This module contains the fundamental types used throughout depscan:
//!
//! - [`Dependency`] - A package declared in a manifest
//! - [`Ecosystem`] - The manifest dialect a dependency came from
//! - [`SeverityLevel`] - Normalized vulnerability severity
//! - [`VulnerabilityRecord`] - A normalized vulnerability entry
//! - [`DependencyResult`] - Findings for one dependency
//! - [`ScanReport`] - Complete scan results
//!
//! # Example
//!
//! ```
//! use depscan::{Dependency, DependencyResult, Ecosystem, RiskLevel, ScanReport};
//!
//! let dependency = Dependency::new("flask", Ecosystem::Python, "2.2.0");
//! let result = DependencyResult::new(dependency, Vec::new());
//! assert_eq!(result.risk_level(), RiskLevel::NoKnownVulnerability);
//!
//! let report = ScanReport::from_results(vec![result], Vec::new(), false);
//! assert_eq!(report.total_count, 1);
//! ```

mod dependency;
mod report;
mod vulnerability;

pub use dependency::*;
pub use report::*;
pub use vulnerability::*;

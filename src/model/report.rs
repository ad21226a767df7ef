use super::{Dependency, SeverityLevel, VulnerabilityRecord};
use crate::error::SourceError;
use crate::parser::ParseWarning;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Risk bucket of a dependency: the most severe finding, or none at all.
///
/// `NoKnownVulnerability` orders below every severity; severities follow
/// the [`SeverityLevel`] ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    NoKnownVulnerability,
    Severity(SeverityLevel),
}

impl RiskLevel {
    /// The maximum severity among `records`.
    pub fn from_records(records: &[VulnerabilityRecord]) -> Self {
        records
            .iter()
            .map(|r| r.severity)
            .max()
            .map_or(RiskLevel::NoKnownVulnerability, RiskLevel::Severity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::NoKnownVulnerability => "NO_KNOWN_VULNERABILITY",
            RiskLevel::Severity(level) => level.as_str(),
        }
    }

    pub fn is_vulnerable(&self) -> bool {
        matches!(self, RiskLevel::Severity(_))
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Findings for a single dependency.
///
/// The risk level is always derived from the current vulnerability list.
#[derive(Debug, Clone)]
pub struct DependencyResult {
    dependency: Dependency,
    vulnerabilities: Vec<VulnerabilityRecord>,
    error: Option<SourceError>,
}

impl DependencyResult {
    pub fn new(dependency: Dependency, vulnerabilities: Vec<VulnerabilityRecord>) -> Self {
        Self {
            dependency,
            vulnerabilities,
            error: None,
        }
    }

    /// A dependency whose lookup could not complete.
    pub fn failed(dependency: Dependency, error: SourceError) -> Self {
        Self {
            dependency,
            vulnerabilities: Vec::new(),
            error: Some(error),
        }
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn vulnerabilities(&self) -> &[VulnerabilityRecord] {
        &self.vulnerabilities
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.error.as_ref()
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_records(&self.vulnerabilities)
    }

    /// Drops findings rejected by `keep`.
    pub fn retain_vulnerabilities<F>(&mut self, keep: F)
    where
        F: FnMut(&VulnerabilityRecord) -> bool,
    {
        self.vulnerabilities.retain(keep);
    }
}

impl Serialize for DependencyResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DependencyResult", 4)?;
        state.serialize_field("dependency", &self.dependency)?;
        state.serialize_field("risk_level", &self.risk_level())?;
        state.serialize_field("vulnerabilities", &self.vulnerabilities)?;
        if let Some(error) = &self.error {
            state.serialize_field("error", error)?;
        } else {
            state.skip_field("error")?;
        }
        state.end()
    }
}

/// Complete results of one scan.
///
/// Build with [`ScanReport::from_results`] so every summary field agrees with
/// `results`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub results: Vec<DependencyResult>,
    pub severity_counts: BTreeMap<SeverityLevel, usize>,
    pub vulnerable_count: usize,
    pub total_count: usize,
    pub total_vulnerabilities: usize,
    pub failed_count: usize,
    pub risk_score: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn from_results(
        results: Vec<DependencyResult>,
        warnings: Vec<ParseWarning>,
        cancelled: bool,
    ) -> Self {
        let mut severity_counts: BTreeMap<SeverityLevel, usize> =
            SeverityLevel::ALL.iter().map(|level| (*level, 0)).collect();
        let mut risk_score = 0;

        for record in results.iter().flat_map(|r| r.vulnerabilities()) {
            *severity_counts.entry(record.severity).or_insert(0) += 1;
            risk_score += record.severity.weight();
        }

        Self {
            vulnerable_count: results
                .iter()
                .filter(|r| r.risk_level().is_vulnerable())
                .count(),
            total_count: results.len(),
            total_vulnerabilities: severity_counts.values().sum(),
            failed_count: results.iter().filter(|r| r.error().is_some()).count(),
            risk_score,
            severity_counts,
            generated_at: Utc::now(),
            results,
            warnings,
            cancelled,
        }
    }

    pub fn count(&self, level: SeverityLevel) -> usize {
        self.severity_counts.get(&level).copied().unwrap_or(0)
    }

    /// Highest risk bucket across all dependencies.
    pub fn worst_risk(&self) -> RiskLevel {
        self.results
            .iter()
            .map(DependencyResult::risk_level)
            .max()
            .unwrap_or(RiskLevel::NoKnownVulnerability)
    }

    /// One-line human summary, e.g. `3 vulnerabilities found: 1 critical, 2 low`.
    pub fn summary_line(&self) -> String {
        if self.total_vulnerabilities == 0 {
            return "No vulnerabilities found".to_string();
        }

        let parts: Vec<String> = [
            SeverityLevel::Critical,
            SeverityLevel::High,
            SeverityLevel::Medium,
            SeverityLevel::Low,
            SeverityLevel::None,
            SeverityLevel::Unknown,
        ]
        .iter()
        .filter_map(|level| {
            let count = self.count(*level);
            (count > 0).then(|| format!("{} {}", count, level.as_str().to_lowercase()))
        })
        .collect();

        format!(
            "{} vulnerabilities found: {}",
            self.total_vulnerabilities,
            parts.join(", ")
        )
    }
}

//! Severity normalization for raw vulnerability records.
//!
//! Records can carry several CVSS scoring schemas at once. The schemas are
//! tried in the order of [`SCHEMA_PRECEDENCE`] and the first one present
//! decides the severity, even if an older schema would bucket the record
//! differently. New schemas are supported by adding a row to the table.

use crate::error::MalformedRecord;
use crate::model::{Reference, SeverityLevel, VulnerabilityRecord};
use crate::source::{RawMetric, RawVulnerability};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// References kept per record.
const MAX_REFERENCES: usize = 3;

/// How a schema's metric is turned into a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityRule {
    /// Use the explicit qualitative `baseSeverity` label.
    Label,
    /// Bucket the numeric `baseScore` (CVSS v2 thresholds).
    ScoreThresholds,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoringSchema {
    /// Key of the schema in the record's `metrics` object.
    pub key: &'static str,
    pub rule: SeverityRule,
}

/// Newest and most precise schema first.
pub const SCHEMA_PRECEDENCE: &[ScoringSchema] = &[
    ScoringSchema {
        key: "cvssMetricV31",
        rule: SeverityRule::Label,
    },
    ScoringSchema {
        key: "cvssMetricV30",
        rule: SeverityRule::Label,
    },
    ScoringSchema {
        key: "cvssMetricV2",
        rule: SeverityRule::ScoreThresholds,
    },
];

/// Maps a CVSS v2 base score to a severity.
pub fn severity_from_score(score: f64) -> SeverityLevel {
    if score >= 7.0 {
        SeverityLevel::High
    } else if score >= 4.0 {
        SeverityLevel::Medium
    } else {
        SeverityLevel::Low
    }
}

impl ScoringSchema {
    /// Severity and score from this schema, or `None` if the schema is absent.
    fn resolve(&self, metric: &RawMetric) -> Option<(SeverityLevel, Option<f64>)> {
        let score = metric.cvss_data.as_ref().and_then(|d| d.base_score);
        match self.rule {
            SeverityRule::Label => {
                let label = metric
                    .cvss_data
                    .as_ref()
                    .and_then(|d| d.base_severity.as_deref())
                    .or(metric.base_severity.as_deref())?;
                let severity = SeverityLevel::from_label(label).unwrap_or_else(|| {
                    debug!(schema = self.key, label, "unrecognized severity label");
                    SeverityLevel::Unknown
                });
                Some((severity, score))
            }
            SeverityRule::ScoreThresholds => score.map(|s| (severity_from_score(s), Some(s))),
        }
    }
}

/// Resolves severity and score from a record's `metrics` object.
pub fn resolve_severity(metrics: &BTreeMap<String, Vec<RawMetric>>) -> (SeverityLevel, Option<f64>) {
    SCHEMA_PRECEDENCE
        .iter()
        .find_map(|schema| {
            let metric = metrics.get(schema.key)?.first()?;
            schema.resolve(metric)
        })
        .unwrap_or((SeverityLevel::Unknown, None))
}

/// Parses NVD timestamps, which usually omit the UTC offset.
fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            debug!(value, error = %e, "unparseable timestamp");
            None
        }
    }
}

/// Converts a raw record into a [`VulnerabilityRecord`].
///
/// # Errors
///
/// Returns [`MalformedRecord`] when the record has no identifier.
pub fn normalize(raw: &RawVulnerability) -> Result<VulnerabilityRecord, MalformedRecord> {
    let id = raw
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| MalformedRecord::new("missing identifier"))?;

    let (severity, score) = resolve_severity(&raw.metrics);

    let references = raw
        .references
        .iter()
        .take(MAX_REFERENCES)
        .map(|r| Reference {
            url: r.url.clone().unwrap_or_default(),
            source: r.source.clone().unwrap_or_default(),
        })
        .collect();

    Ok(VulnerabilityRecord {
        id: id.to_string(),
        description: raw.english_description().unwrap_or_default().to_string(),
        severity,
        score,
        published_at: parse_timestamp(raw.published.as_deref()),
        last_modified: parse_timestamp(raw.last_modified.as_deref()),
        references,
    })
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized severity of a vulnerability record.
///
/// The derived ordering is `None < Low < Medium < High < Critical < Unknown`.
/// It orders report listings and picks a dependency's risk level. `Unknown`
/// means a record exists but its severity could not be classified, so it is
/// never treated as `None`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
    Unknown,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 6] = [
        SeverityLevel::None,
        SeverityLevel::Low,
        SeverityLevel::Medium,
        SeverityLevel::High,
        SeverityLevel::Critical,
        SeverityLevel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::None => "NONE",
            SeverityLevel::Low => "LOW",
            SeverityLevel::Medium => "MEDIUM",
            SeverityLevel::High => "HIGH",
            SeverityLevel::Critical => "CRITICAL",
            SeverityLevel::Unknown => "UNKNOWN",
        }
    }

    /// Parses a CVSS qualitative rating such as `"HIGH"`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "NONE" => Some(SeverityLevel::None),
            "LOW" => Some(SeverityLevel::Low),
            "MEDIUM" | "MODERATE" => Some(SeverityLevel::Medium),
            "HIGH" => Some(SeverityLevel::High),
            "CRITICAL" => Some(SeverityLevel::Critical),
            _ => None,
        }
    }

    /// Weight contributed to a report's aggregate risk score.
    pub fn weight(&self) -> u32 {
        match self {
            SeverityLevel::Critical => 10,
            SeverityLevel::High => 7,
            SeverityLevel::Medium => 4,
            SeverityLevel::Low => 2,
            SeverityLevel::Unknown => 1,
            SeverityLevel::None => 0,
        }
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub source: String,
}

/// A vulnerability normalized from the upstream database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub id: String,
    pub description: String,
    pub severity: SeverityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    pub references: Vec<Reference>,
}

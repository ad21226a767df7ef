use serde::Deserialize;
use std::collections::BTreeMap;

/// A CVE entry as returned by the NVD CVE API.
///
/// Every field is optional or defaulted so partially populated entries still
/// decode. Whether an entry is usable is decided by the severity normalizer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVulnerability {
    pub id: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<RawDescription>,
    /// Scoring data keyed by schema, e.g. `cvssMetricV31`.
    #[serde(default)]
    pub metrics: BTreeMap<String, Vec<RawMetric>>,
    pub published: Option<String>,
    pub last_modified: Option<String>,
    #[serde(default)]
    pub references: Vec<RawReference>,
    #[serde(default)]
    pub configurations: Vec<RawConfiguration>,
}

impl RawVulnerability {
    /// The English description, if any.
    pub fn english_description(&self) -> Option<&str> {
        self.descriptions
            .iter()
            .find(|d| d.lang == "en")
            .map(|d| d.value.as_str())
    }

    /// All CPE platform identifiers attached to the affected configurations.
    pub fn platform_identifiers(&self) -> impl Iterator<Item = &str> {
        self.configurations
            .iter()
            .flat_map(|c| &c.nodes)
            .flat_map(|n| &n.cpe_match)
            .filter_map(|m| m.criteria.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDescription {
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetric {
    pub cvss_data: Option<RawCvssData>,
    /// CVSS v2 metrics carry the qualitative rating next to `cvssData`.
    pub base_severity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCvssData {
    pub base_score: Option<f64>,
    pub base_severity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReference {
    pub url: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfiguration {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default)]
    pub cpe_match: Vec<RawCpeMatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCpeMatch {
    pub criteria: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_nvd_cve_object() {
        let raw: RawVulnerability = serde_json::from_value(json!({
            "id": "CVE-2023-30861",
            "published": "2023-05-02T18:15:52.343",
            "lastModified": "2023-05-12T05:15:18.200",
            "descriptions": [
                {"lang": "es", "value": "Flask es un framework"},
                {"lang": "en", "value": "Flask is a lightweight WSGI web application framework."}
            ],
            "metrics": {
                "cvssMetricV31": [{
                    "source": "nvd@nist.gov",
                    "cvssData": {"version": "3.1", "baseScore": 7.5, "baseSeverity": "HIGH"}
                }]
            },
            "configurations": [{
                "nodes": [{
                    "operator": "OR",
                    "cpeMatch": [{"vulnerable": true, "criteria": "cpe:2.3:a:palletsprojects:flask:*:*:*:*:*:*:*:*"}]
                }]
            }],
            "references": [{"url": "https://example.org/advisory", "source": "security-advisories@github.com"}]
        }))
        .unwrap();

        assert_eq!(raw.id.as_deref(), Some("CVE-2023-30861"));
        assert_eq!(
            raw.english_description(),
            Some("Flask is a lightweight WSGI web application framework.")
        );
        assert_eq!(raw.metrics["cvssMetricV31"].len(), 1);
        assert_eq!(
            raw.platform_identifiers().collect::<Vec<_>>(),
            vec!["cpe:2.3:a:palletsprojects:flask:*:*:*:*:*:*:*:*"]
        );
        assert_eq!(raw.last_modified.as_deref(), Some("2023-05-12T05:15:18.200"));
    }

    #[test]
    fn test_decodes_sparse_object() {
        let raw: RawVulnerability = serde_json::from_value(json!({"id": "CVE-1"})).unwrap();
        assert!(raw.english_description().is_none());
        assert!(raw.metrics.is_empty());
        assert_eq!(raw.platform_identifiers().count(), 0);
    }
}

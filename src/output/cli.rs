use crate::model::{RiskLevel, ScanReport, SeverityLevel};
use anyhow::Result;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct DependencyRow {
    #[tabled(rename = "Package")]
    name: String,
    #[tabled(rename = "Ecosystem")]
    ecosystem: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Findings")]
    findings: String,
}

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "CVE")]
    cve: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    print!("{}", render_cli_table(report));
    Ok(())
}

/// Renders the human-readable report.
pub fn render_cli_table(report: &ScanReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Scan completed at: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if report.cancelled {
        let _ = writeln!(out, "Scan was cancelled; results are partial.");
    }
    let _ = writeln!(out);

    if report.results.is_empty() {
        let _ = writeln!(out, "No dependencies scanned.");
    } else {
        let _ = writeln!(out, "Scanned {} dependencies:", report.total_count);
        let _ = writeln!(out);

        let rows: Vec<DependencyRow> = report
            .results
            .iter()
            .map(|r| {
                let dep = r.dependency();
                DependencyRow {
                    name: truncate(dep.name(), 40),
                    ecosystem: dep.ecosystem().display_name().to_string(),
                    version: dep.version_specifier().to_string(),
                    risk: format_risk(r.risk_level()),
                    findings: match r.error() {
                        Some(e) => truncate(&format!("lookup failed: {}", e), 40),
                        None => r.vulnerabilities().len().to_string(),
                    },
                }
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        let _ = writeln!(out, "{}", table);
    }

    let mut vulns: Vec<_> = report
        .results
        .iter()
        .flat_map(|r| r.vulnerabilities().iter().map(move |v| (r.dependency(), v)))
        .collect();

    if !vulns.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Found {} vulnerabilities:", vulns.len());
        let _ = writeln!(out);

        vulns.sort_by_key(|(_, v)| std::cmp::Reverse(v.severity));

        let rows: Vec<VulnRow> = vulns
            .iter()
            .map(|(dep, v)| VulnRow {
                severity: format_severity(v.severity),
                package: dep.name().to_string(),
                cve: v.id.clone(),
                score: v
                    .score
                    .map(|s| format!("{:.1}", s))
                    .unwrap_or_else(|| "-".to_string()),
                description: truncate(&v.description, 60),
            })
            .collect();

        let table = Table::new(rows).with(Style::rounded()).to_string();
        let _ = writeln!(out, "{}", table);
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Skipped {} manifest entries:", report.warnings.len());
        for warning in &report.warnings {
            let _ = writeln!(out, "  {}", warning);
        }
    }

    let _ = writeln!(out);
    write_summary(&mut out, report);
    out
}

fn write_summary(out: &mut String, report: &ScanReport) {
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(
        out,
        "  Dependencies: {} ({} vulnerable)",
        report.total_count, report.vulnerable_count
    );
    if report.failed_count > 0 {
        let _ = writeln!(out, "  Lookups failed: {}", report.failed_count);
    }
    let _ = writeln!(out, "  {}", report.summary_line());
    if report.total_vulnerabilities > 0 {
        let _ = writeln!(out, "  Risk score: {}", report.risk_score);
    }
}

fn format_risk(risk: RiskLevel) -> String {
    match risk {
        RiskLevel::NoKnownVulnerability => "\x1b[32mOK\x1b[0m".to_string(),
        RiskLevel::Severity(level) => format_severity(level),
    }
}

fn format_severity(severity: SeverityLevel) -> String {
    match severity {
        SeverityLevel::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        SeverityLevel::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        SeverityLevel::Medium => "\x1b[33mMEDIUM\x1b[0m".to_string(),
        SeverityLevel::Low => "\x1b[32mLOW\x1b[0m".to_string(),
        SeverityLevel::None => "NONE".to_string(),
        SeverityLevel::Unknown => "UNKNOWN".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::model::{Dependency, DependencyResult, Ecosystem, VulnerabilityRecord};

    fn record(id: &str, severity: SeverityLevel, description: &str) -> VulnerabilityRecord {
        VulnerabilityRecord {
            id: id.to_string(),
            description: description.to_string(),
            severity,
            score: Some(7.5),
            published_at: None,
            last_modified: None,
            references: Vec::new(),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long description", 10), "a very ...");
        assert_eq!(truncate("ünïcödé ünïcödé", 8), "ünïcö...");
    }

    #[test]
    fn test_render_lists_findings_and_failures() {
        let report = ScanReport::from_results(
            vec![
                DependencyResult::new(
                    Dependency::new("flask", Ecosystem::Python, "2.2.0"),
                    vec![record("CVE-2023-30861", SeverityLevel::High, "cookie leak")],
                ),
                DependencyResult::failed(
                    Dependency::new("django", Ecosystem::Python, "4.2"),
                    SourceError::RateLimited,
                ),
            ],
            Vec::new(),
            false,
        );

        let text = render_cli_table(&report);
        assert!(text.contains("flask"));
        assert!(text.contains("CVE-2023-30861"));
        assert!(text.contains("7.5"));
        assert!(text.contains("lookup failed"));
        assert!(text.contains("Lookups failed: 1"));
        assert!(text.contains("1 vulnerabilities found: 1 high"));
        assert!(!text.contains("cancelled"));
    }

    #[test]
    fn test_render_empty_and_cancelled() {
        let report = ScanReport::from_results(Vec::new(), Vec::new(), true);
        let text = render_cli_table(&report);
        assert!(text.contains("No dependencies scanned."));
        assert!(text.contains("cancelled"));
        assert!(text.contains("No vulnerabilities found"));
    }
}

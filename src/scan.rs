//! Scan orchestration.
//!
//! [`ScanAggregator`] drives each dependency through the pipeline: query the
//! vulnerability source by package name, keep relevant records, normalize
//! their severity, and collect the findings into a [`ScanReport`].
//!
//! A failed lookup never aborts a scan. The affected dependency is reported
//! with no findings and the error attached, and the scan moves on.
//!
//! # Example
//!
//! ```no_run
//! use depscan::scan::ScanAggregator;
//! use depscan::source::NvdSource;
//! use depscan::Ecosystem;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let aggregator = ScanAggregator::new(Arc::new(NvdSource::new(None)));
//!     let report = aggregator
//!         .scan_manifest("flask==2.2.0\n", Ecosystem::Python, &CancellationToken::new())
//!         .await?;
//!     println!("{}", report.summary_line());
//!     Ok(())
//! }
//! ```

use crate::config::{Config, IgnoreConfig};
use crate::error::{ScanError, SourceError};
use crate::model::{
    Dependency, DependencyResult, Ecosystem, ScanReport, VulnerabilityRecord, LATEST,
};
use crate::parser::{self, ParseWarning};
use crate::relevance::is_relevant;
use crate::severity::normalize;
use crate::source::VulnerabilitySource;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Tuning knobs for a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Courtesy delay before each dependency after the first.
    pub pacing_delay: Duration,
    /// Dependencies looked up at once. Values below 1 are treated as 1.
    pub concurrency: usize,
    pub ignore: IgnoreConfig,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pacing_delay: Duration::from_secs(2),
            concurrency: 1,
            ignore: IgnoreConfig::default(),
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pacing_delay: Duration::from_millis(config.pacing_delay_ms),
            concurrency: config.concurrency.max(1),
            ignore: config.ignore.clone(),
        }
    }
}

/// Result of looking up one package name.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// At least one relevant record.
    Found(Vec<VulnerabilityRecord>),
    /// The lookup succeeded and nothing relevant came back.
    Empty,
    /// The lookup could not complete.
    Failed(SourceError),
}

pub struct ScanAggregator {
    source: Arc<dyn VulnerabilitySource>,
    options: ScanOptions,
}

impl ScanAggregator {
    pub fn new(source: Arc<dyn VulnerabilitySource>) -> Self {
        Self {
            source,
            options: ScanOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Queries, filters and normalizes the records for `package_name`.
    pub async fn lookup(&self, package_name: &str) -> QueryOutcome {
        let raw = match self.source.query(package_name).await {
            Ok(raw) => raw,
            Err(e) => return QueryOutcome::Failed(e),
        };

        let returned = raw.len();
        let records: Vec<VulnerabilityRecord> = raw
            .iter()
            .filter(|r| is_relevant(r, package_name))
            .filter_map(|r| match normalize(r) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(package = package_name, error = %e, "dropping record");
                    None
                }
            })
            .filter(|record| !self.options.ignore.should_ignore_vulnerability(&record.id))
            .collect();

        debug!(
            package = package_name,
            returned,
            kept = records.len(),
            "lookup complete"
        );

        if records.is_empty() {
            QueryOutcome::Empty
        } else {
            QueryOutcome::Found(records)
        }
    }

    /// Looks up one dependency. Only the name is sent upstream.
    #[instrument(skip(self, dependency), fields(package = dependency.name()))]
    pub async fn check_dependency(&self, dependency: &Dependency) -> DependencyResult {
        match self.lookup(dependency.query_name()).await {
            QueryOutcome::Found(records) => DependencyResult::new(dependency.clone(), records),
            QueryOutcome::Empty => DependencyResult::new(dependency.clone(), Vec::new()),
            QueryOutcome::Failed(e) => {
                warn!(error = %e, "lookup failed, continuing scan");
                DependencyResult::failed(dependency.clone(), e)
            }
        }
    }

    /// Checks a single package outside of a manifest scan.
    ///
    /// The package is recorded as a Python dependency; use
    /// [`lookup_one_in`](Self::lookup_one_in) to choose the ecosystem.
    pub async fn lookup_one(&self, name: &str, version: Option<&str>) -> DependencyResult {
        self.lookup_one_in(name, version, Ecosystem::Python).await
    }

    pub async fn lookup_one_in(
        &self,
        name: &str,
        version: Option<&str>,
        ecosystem: Ecosystem,
    ) -> DependencyResult {
        let dependency = Dependency::new(name.trim(), ecosystem, version.unwrap_or(LATEST));
        self.check_dependency(&dependency).await
    }

    /// Scans a list of dependencies.
    ///
    /// If `cancel` fires, in-flight lookups are dropped and the results
    /// completed so far are returned with `cancelled` set.
    pub async fn run_scan(
        &self,
        dependencies: &[Dependency],
        cancel: &CancellationToken,
    ) -> ScanReport {
        self.run(dependencies, Vec::new(), cancel).await
    }

    /// Parses `content` and scans the resulting dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidManifest`] when no dependency could be
    /// read. No query is issued in that case.
    #[instrument(skip(self, content, cancel))]
    pub async fn scan_manifest(
        &self,
        content: &str,
        ecosystem: Ecosystem,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let outcome = parser::parse(content, ecosystem);
        if outcome.dependencies.is_empty() {
            return Err(ScanError::InvalidManifest {
                warnings: outcome.warnings.len(),
            });
        }

        info!(
            dependencies = outcome.dependencies.len(),
            warnings = outcome.warnings.len(),
            "manifest parsed"
        );
        Ok(self
            .run(&outcome.dependencies, outcome.warnings, cancel)
            .await)
    }

    async fn run(
        &self,
        dependencies: &[Dependency],
        warnings: Vec<ParseWarning>,
        cancel: &CancellationToken,
    ) -> ScanReport {
        let targets: Vec<&Dependency> = dependencies
            .iter()
            .filter(|dep| {
                let ignored = self.options.ignore.should_ignore_package(dep.name());
                if ignored {
                    debug!(package = dep.name(), "package ignored by configuration");
                }
                !ignored
            })
            .collect();

        let pacing = self.options.pacing_delay;
        let concurrency = self.options.concurrency.max(1);
        let total = targets.len();

        let mut pending = std::pin::pin!(stream::iter(targets.into_iter().enumerate())
            .map(move |(idx, dep)| async move {
                if idx > 0 && !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
                self.check_dependency(dep).await
            })
            .buffered(concurrency));

        let mut results = Vec::with_capacity(total);
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    warn!(
                        completed = results.len(),
                        total,
                        "scan cancelled, returning partial report"
                    );
                    break;
                }
                next = pending.next() => match next {
                    Some(result) => {
                        debug!(
                            completed = results.len() + 1,
                            total,
                            "dependency processed"
                        );
                        results.push(result);
                    }
                    None => break,
                },
            }
        }

        let report = ScanReport::from_results(results, warnings, cancelled);
        info!(
            total = report.total_count,
            vulnerable = report.vulnerable_count,
            failed = report.failed_count,
            "scan complete"
        );
        report
    }
}

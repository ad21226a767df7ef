pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod parser;
pub mod ratelimit;
pub mod relevance;
pub mod scan;
pub mod severity;
pub mod source;

pub use config::Config;
pub use error::{MalformedRecord, ScanError, SourceError};
pub use model::{
    Dependency, DependencyResult, Ecosystem, RiskLevel, ScanReport, SeverityLevel,
    VulnerabilityRecord,
};
pub use scan::ScanAggregator;
pub use source::VulnerabilitySource;

//! Vulnerability data sources.
//!
//! A [`VulnerabilitySource`] turns a package name into raw vulnerability
//! records. The records are left exactly as the upstream database returned
//! them. Relevance filtering and severity normalization happen later in the
//! pipeline.

mod nvd;
mod raw;

pub use nvd::{NvdSource, DEFAULT_NVD_URL};
pub use raw::*;

use crate::error::SourceError;
use async_trait::async_trait;

#[async_trait]
pub trait VulnerabilitySource: Send + Sync {
    /// Returns the human-readable name of this source.
    fn name(&self) -> &'static str;

    /// Searches the database for records mentioning `package_name`.
    ///
    /// An empty list means the lookup succeeded and found nothing.
    async fn query(&self, package_name: &str) -> Result<Vec<RawVulnerability>, SourceError>;
}

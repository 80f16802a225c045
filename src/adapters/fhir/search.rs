//! FHIR search capability
//!
//! The paginator only depends on this trait, so the pipeline can run against
//! an HTTP server or an in-memory fake.

use super::models::Bundle;
use crate::domain::Result;
use async_trait::async_trait;

/// Trait for anything that can answer FHIR searches
///
/// # Example
///
/// ```no_run
/// use capacity_mapping::adapters::fhir::{FhirClient, FhirSearch};
/// use capacity_mapping::config::FhirConfig;
///
/// # async fn example() -> capacity_mapping::domain::Result<()> {
/// let client = FhirClient::new(FhirConfig::default())?;
/// let first_page = client.search("Patient").await?;
/// if let Some(next) = first_page.next_link() {
///     let _second_page = client.fetch_page(next).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FhirSearch: Send + Sync {
    /// Performs an unfiltered search over `resource_type` and returns the first page
    async fn search(&self, resource_type: &str) -> Result<Bundle>;

    /// Fetches a follow-up page by the URL of a `next` link
    async fn fetch_page(&self, url: &str) -> Result<Bundle>;

    /// Base URL of the server, used in log output
    fn base_url(&self) -> &str;
}

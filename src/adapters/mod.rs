//! External system integrations.
//!
//! - [`fhir`] - FHIR R4 server (search, pagination, resource creation)
//! - [`redcap`] - REDCap record import API
//!
//! # Design Pattern
//!
//! Each adapter exposes a trait at the seam the core depends on
//! ([`fhir::FhirSearch`], [`redcap::RecordSink`]) next to its HTTP
//! implementation, so the export pipeline can be driven by in-memory fakes
//! in tests.
//!
//! ```rust,no_run
//! use capacity_mapping::adapters::fhir::{FhirClient, FhirSearch};
//! use capacity_mapping::config::FhirConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FhirClient::new(FhirConfig {
//!     base_url: "https://hapi.example.org/baseR4".to_string(),
//!     page_size: Some(100),
//!     ..Default::default()
//! })?;
//!
//! let first_page = client.search("Patient").await?;
//! println!("{} patients on the first page", first_page.entry.len());
//! # Ok(())
//! # }
//! ```

pub mod fhir;
pub mod redcap;

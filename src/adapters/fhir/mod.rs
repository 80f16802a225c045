//! FHIR server adapter
//!
//! Search capability trait, Bundle wire models and the HTTP client.

pub mod client;
pub mod models;
pub mod search;

pub use client::FhirClient;
pub use models::{Bundle, BundleEntry, BundleLink, RejectedEntry, ResourcePage};
pub use search::FhirSearch;

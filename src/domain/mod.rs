//! Domain models and types for the CAPACITY mapping pipeline.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **FHIR resource views** ([`Patient`], [`Encounter`]) with just the members the
//!   mapping reads
//! - **The join key** ([`PatientKey`]) correlating patients with their encounters
//! - **Error types** ([`CapacityError`], [`FhirError`], [`RegistryError`], [`MappingError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, CapacityError>`]:
//!
//! ```rust
//! use capacity_mapping::domain::{CapacityError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = capacity_mapping::config::load_config("capacity.toml")?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod resources;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{CapacityError, CodebookError, FhirError, MappingError, RegistryError};
pub use ids::PatientKey;
pub use resources::{Encounter, FhirResource, Identifier, Patient, Period, Reference};
pub use result::Result;

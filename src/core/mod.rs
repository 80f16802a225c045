//! Core pipeline of the CAPACITY mapping.
//!
//! # Modules
//!
//! - [`pagination`] - Lazy streams over paginated FHIR searches
//! - [`join`] - Patient/encounter join keyed by [`PatientKey`](crate::domain::PatientKey)
//! - [`codebook`] - CAPACITY field names, value tables and flat records
//! - [`mapping`] - Patient and encounters to a codebook record
//! - [`events`] - Join warnings and mapping failures as events
//! - [`export`] - Batch driver, coordinator and summary
//!
//! # Export Workflow
//!
//! 1. **Retrieve**: page through all Patient resources, then all Encounters
//! 2. **Join**: index patients, attach each encounter to its subject
//! 3. **Map**: derive age, admission and discharge fields per patient
//! 4. **Split**: one baseline and one discharge record per patient
//! 5. **Upload**: import all records into REDCap in one call
//!
//! # Example
//!
//! ```rust,no_run
//! use capacity_mapping::config::load_config;
//! use capacity_mapping::core::export::ExportCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("capacity.toml")?;
//! let coordinator = ExportCoordinator::new(config)?;
//!
//! let summary = coordinator.execute_export().await?;
//! println!("Successful: {}", summary.successful);
//! println!("Failed: {}", summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod codebook;
pub mod events;
pub mod export;
pub mod join;
pub mod mapping;
pub mod pagination;

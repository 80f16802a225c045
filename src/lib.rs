// CAPACITY Mapping - FHIR to CAPACITY REDCap ETL Tool
// Copyright (c) 2025 CAPACITY Mapping Contributors
// Licensed under the MIT License

//! # CAPACITY Mapping - FHIR to CAPACITY REDCap ETL
//!
//! Reads every Patient and Encounter from a FHIR R4 server, maps each patient
//! onto the CAPACITY registry codebook and imports the result into a REDCap
//! project in a single upload.
//!
//! ## Overview
//!
//! - **Extracting** patients and encounters through lazily paginated searches
//! - **Joining** encounters to their patient by subject reference
//! - **Mapping** each patient into a baseline and an outcome record
//! - **Loading** all records into REDCap with one import request
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pagination, join, codebook, mapping and export orchestration
//! - [`adapters`] - External integrations (FHIR server, REDCap API)
//! - [`domain`] - FHIR resource views, join key and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use capacity_mapping::config::load_config;
//! use capacity_mapping::core::export::ExportCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("capacity.toml")?;
//!     let coordinator = ExportCoordinator::new(config)?;
//!
//!     let summary = coordinator.execute_export().await?;
//!
//!     println!(
//!         "Mapped {} of {} patients",
//!         summary.successful, summary.total_patients
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Failure isolation
//!
//! A patient that cannot be mapped is logged and left out; the remaining
//! patients are still uploaded. Failures talking to the FHIR server or to
//! REDCap abort the run before anything is written.
//!
//! ```rust
//! use capacity_mapping::core::mapping::map_patient;
//! use capacity_mapping::domain::Patient;
//!
//! let patient = Patient {
//!     id: Some("1".to_string()),
//!     gender: Some("female".to_string()),
//!     ..Default::default()
//! };
//! let record = map_patient(&patient, &[]).unwrap();
//! assert_eq!(record.patient_id(), "Patient/1");
//! assert_eq!(record.outcome_date_known(), Some(false));
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

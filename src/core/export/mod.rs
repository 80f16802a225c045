//! Export orchestration and batch processing
//!
//! This module provides:
//! - The batch driver with per-patient failure isolation
//! - Export coordination from FHIR search to registry upload
//! - Summary and reporting

pub mod batch;
pub mod coordinator;
pub mod summary;

pub use batch::{BatchConfig, BatchProcessor, BatchResult, RecordFailure};
pub use coordinator::{ExportCoordinator, ExportOptions, PreparedExport};
pub use summary::ExportSummary;

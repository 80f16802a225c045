//! Export summary and reporting

use super::batch::{BatchResult, RecordFailure};
use std::time::Duration;

/// Summary of an export run
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    /// Number of joined patients
    pub total_patients: usize,

    /// Patients mapped successfully
    pub successful: usize,

    /// Patients that could not be mapped
    pub failed: usize,

    /// Flat records produced (two per successful patient)
    pub records_produced: usize,

    /// Records accepted by the registry
    pub records_uploaded: usize,

    /// Encounters dropped because their patient was not retrieved
    pub orphan_encounters: usize,

    /// Patient entries skipped because they could not be read
    pub invalid_patients: usize,

    /// Encounter entries skipped because they could not be read
    pub invalid_encounters: usize,

    /// Whether the upload was skipped
    pub dry_run: bool,

    /// Duration of the export
    pub duration: Duration,

    /// Patients that failed, with the reason
    pub failures: Vec<RecordFailure>,
}

impl ExportSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the summary of a finished batch
    pub fn from_batch(batch: BatchResult, orphan_encounters: usize, dry_run: bool) -> Self {
        Self {
            total_patients: batch.total(),
            successful: batch.successful,
            failed: batch.failed,
            records_produced: batch.records.len(),
            records_uploaded: batch.uploaded,
            orphan_encounters,
            invalid_patients: 0,
            invalid_encounters: 0,
            dry_run,
            duration: Duration::ZERO,
            failures: batch.failures,
        }
    }

    /// Set the number of unreadable patient and encounter entries
    pub fn with_invalid_resources(mut self, patients: usize, encounters: usize) -> Self {
        self.invalid_patients = patients;
        self.invalid_encounters = encounters;
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Check if every retrieved entry was read and every patient was mapped
    pub fn is_successful(&self) -> bool {
        self.failed == 0 && self.invalid_patients == 0 && self.invalid_encounters == 0
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_patients == 0 {
            return 100.0;
        }
        (self.successful as f64 / self.total_patients as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            total_patients = self.total_patients,
            successful = self.successful,
            failed = self.failed,
            records_produced = self.records_produced,
            records_uploaded = self.records_uploaded,
            orphan_encounters = self.orphan_encounters,
            invalid_patients = self.invalid_patients,
            invalid_encounters = self.invalid_encounters,
            dry_run = self.dry_run,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Export completed"
        );

        if !self.failures.is_empty() {
            tracing::warn!(
                failure_count = self.failures.len(),
                "Export completed with failed patients"
            );
        }

        if self.invalid_patients + self.invalid_encounters > 0 {
            tracing::warn!(
                invalid_patients = self.invalid_patients,
                invalid_encounters = self.invalid_encounters,
                "Export skipped entries that could not be read"
            );
        }
    }
}

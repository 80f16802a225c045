//! Batch driver
//!
//! Maps every joined patient, isolates per-patient failures, and hands the
//! complete list of flat records to the upload sink in one call.

use crate::adapters::redcap::RecordSink;
use crate::core::codebook::FlatRecord;
use crate::core::events::{EventSink, PipelineEvent};
use crate::core::join::PatientRecord;
use crate::core::mapping::map_record;
use crate::domain::{MappingError, PatientKey, Result};

/// Configuration for batch processing
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Map everything but skip the upload
    pub dry_run: bool,
}

impl BatchConfig {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

/// A patient that was left out of the upload
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    pub patient: PatientKey,
    pub reason: String,
}

/// Result of processing all joined records
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Number of patients mapped successfully
    pub successful: usize,
    /// Number of patients that failed to map
    pub failed: usize,
    /// Failure details, in processing order
    pub failures: Vec<RecordFailure>,
    /// Flat records produced, two per successful patient
    pub records: Vec<FlatRecord>,
    /// Records accepted by the sink (0 when the upload was skipped)
    pub uploaded: usize,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successfully mapped patient
    pub fn add_success(&mut self, records: [FlatRecord; 2]) {
        self.successful += 1;
        self.records.extend(records);
    }

    /// Add a failed patient
    pub fn add_failure(&mut self, patient: PatientKey, reason: String) {
        self.failed += 1;
        self.failures.push(RecordFailure { patient, reason });
    }

    pub fn total(&self) -> usize {
        self.successful + self.failed
    }
}

/// Batch processor for joined patient records
pub struct BatchProcessor {
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Maps every record without uploading
    ///
    /// A failing patient is reported through `events` and counted; the loop
    /// always continues with the next patient.
    pub fn map_all<'a, I>(&self, records: I, events: &dyn EventSink) -> BatchResult
    where
        I: IntoIterator<Item = &'a PatientRecord>,
    {
        let mut result = BatchResult::new();

        for record in records {
            match map_and_split(record) {
                Ok(flat) => result.add_success(flat),
                Err(e) => {
                    let reason = e.to_string();
                    events.emit(PipelineEvent::MappingFailed {
                        patient: record.key.clone(),
                        reason: reason.clone(),
                    });
                    result.add_failure(record.key.clone(), reason);
                }
            }
        }

        tracing::info!(
            successful = result.successful,
            failed = result.failed,
            records = result.records.len(),
            "Mapped patients"
        );

        result
    }

    /// Maps every record and uploads the result
    ///
    /// Equivalent to [`map_all`](Self::map_all) followed by
    /// [`upload`](Self::upload).
    pub async fn process<'a, I>(
        &self,
        records: I,
        sink: &dyn RecordSink,
        events: &dyn EventSink,
    ) -> Result<BatchResult>
    where
        I: IntoIterator<Item = &'a PatientRecord>,
    {
        let result = self.map_all(records, events);
        self.upload(result, sink).await
    }

    /// Hands the mapped records to `sink` in one call
    ///
    /// The upload is skipped when nothing was mapped or in dry-run mode. An
    /// error from the sink is returned as is.
    pub async fn upload(
        &self,
        mut result: BatchResult,
        sink: &dyn RecordSink,
    ) -> Result<BatchResult> {
        if result.records.is_empty() {
            tracing::warn!("No records to upload");
            return Ok(result);
        }

        if self.config.dry_run {
            tracing::info!(
                records = result.records.len(),
                destination = %sink.destination(),
                "Dry run: skipping upload"
            );
            return Ok(result);
        }

        result.uploaded = sink.import_records(&result.records).await?;

        if result.uploaded != result.records.len() {
            tracing::warn!(
                sent = result.records.len(),
                accepted = result.uploaded,
                "Registry accepted a different number of records than sent"
            );
        }

        Ok(result)
    }
}

fn map_and_split(record: &PatientRecord) -> std::result::Result<[FlatRecord; 2], MappingError> {
    let mapped = map_record(record)?;
    Ok(mapped.to_records()?)
}

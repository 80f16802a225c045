//! Export coordinator - main orchestrator for the export process
//!
//! Wires the FHIR search capability, the paginator, the joiner, the batch
//! driver and the upload sink together.

use crate::adapters::fhir::{FhirClient, FhirSearch};
use crate::adapters::redcap::{RecordSink, RedcapClient};
use crate::config::CapacityConfig;
use crate::core::events::{CountingEventSink, EventSink, TracingEventSink};
use crate::core::export::batch::{BatchConfig, BatchProcessor, BatchResult};
use crate::core::export::summary::ExportSummary;
use crate::core::join::join_resources;
use crate::core::pagination::paginate;
use crate::domain::{Encounter, Patient, Result};
use std::sync::Arc;
use std::time::Instant;

/// Run options that are not part of either client
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub dry_run: bool,
}

/// Everything read and mapped by [`ExportCoordinator::prepare`], not yet uploaded
#[derive(Debug)]
pub struct PreparedExport {
    pub batch: BatchResult,
    pub orphan_encounters: usize,
    pub invalid_patients: usize,
    pub invalid_encounters: usize,
    started: Instant,
}

impl PreparedExport {
    /// Flat records waiting for upload
    pub fn record_count(&self) -> usize {
        self.batch.records.len()
    }
}

/// Export coordinator
pub struct ExportCoordinator {
    search: Arc<dyn FhirSearch>,
    sink: Arc<dyn RecordSink>,
    events: Arc<dyn EventSink>,
    batch_processor: BatchProcessor,
    options: ExportOptions,
}

impl ExportCoordinator {
    /// Create a coordinator with HTTP clients built from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either client cannot be built.
    pub fn new(config: CapacityConfig) -> Result<Self> {
        let search = Arc::new(FhirClient::new(config.fhir)?);
        let sink = Arc::new(RedcapClient::new(config.registry)?);
        let options = ExportOptions {
            dry_run: config.application.dry_run,
        };
        Ok(Self::with_clients(search, sink, options))
    }

    /// Create a coordinator over arbitrary search and sink implementations
    pub fn with_clients(
        search: Arc<dyn FhirSearch>,
        sink: Arc<dyn RecordSink>,
        options: ExportOptions,
    ) -> Self {
        Self {
            search,
            sink,
            events: Arc::new(TracingEventSink),
            batch_processor: BatchProcessor::new(BatchConfig::new(options.dry_run)),
            options,
        }
    }

    /// Replace the event sink (defaults to [`TracingEventSink`])
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Execute the export
    ///
    /// Runs [`prepare`](Self::prepare) and then [`upload`](Self::upload).
    ///
    /// # Errors
    ///
    /// Page retrieval and upload errors abort the export. Per-patient mapping
    /// failures and unreadable entries do not; they are reported in the
    /// summary.
    pub async fn execute_export(&self) -> Result<ExportSummary> {
        let prepared = self.prepare().await?;
        self.upload(prepared).await
    }

    /// Reads, joins and maps everything without writing to the registry
    ///
    /// 1. Streams all patients and indexes them
    /// 2. Streams all encounters and joins them to their patients
    /// 3. Maps every patient, isolating failures
    ///
    /// # Errors
    ///
    /// Returns the first page retrieval error.
    pub async fn prepare(&self) -> Result<PreparedExport> {
        let started = Instant::now();

        tracing::info!(
            fhir = %self.search.base_url(),
            registry = %self.sink.destination(),
            dry_run = self.options.dry_run,
            "Starting export process"
        );

        let events = CountingEventSink::new(self.events.as_ref());
        let patients = paginate::<Patient, _>(self.search.as_ref(), &events);
        let encounters = paginate::<Encounter, _>(self.search.as_ref(), &events);
        let joined = join_resources(patients, encounters, &events).await?;
        let orphan_encounters = joined.orphan_encounters();

        let batch = self.batch_processor.map_all(&joined, &events);

        Ok(PreparedExport {
            batch,
            orphan_encounters,
            invalid_patients: events.invalid_patients(),
            invalid_encounters: events.invalid_encounters(),
            started,
        })
    }

    /// Uploads prepared records in one import (unless dry run) and summarises the run
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the import fails.
    pub async fn upload(&self, prepared: PreparedExport) -> Result<ExportSummary> {
        let PreparedExport {
            batch,
            orphan_encounters,
            invalid_patients,
            invalid_encounters,
            started,
        } = prepared;

        let batch = self.batch_processor.upload(batch, self.sink.as_ref()).await?;

        let summary = ExportSummary::from_batch(batch, orphan_encounters, self.options.dry_run)
            .with_invalid_resources(invalid_patients, invalid_encounters)
            .with_duration(started.elapsed());
        summary.log_summary();

        Ok(summary)
    }
}

//! Pipeline events
//!
//! Warnings and per-record failures are emitted through an [`EventSink`]
//! passed into the paginator, the joiner and the batch driver instead of being logged from
//! inside them. Production code forwards them to `tracing`; tests capture them.

use crate::domain::{Encounter, FhirResource, Patient, PatientKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Something noteworthy that happened while joining or mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Encounter references a patient that was not retrieved; it is dropped
    OrphanEncounter {
        encounter_id: Option<String>,
        patient: PatientKey,
    },

    /// Encounter has no resolvable subject reference; it is skipped
    EncounterWithoutSubject { encounter_id: Option<String> },

    /// Patient has no usable logical id and cannot be joined
    PatientWithoutId,

    /// A second patient with an already indexed key; the first one is kept
    DuplicatePatient { patient: PatientKey },

    /// The patient could not be mapped and is left out of the upload
    MappingFailed { patient: PatientKey, reason: String },

    /// A search entry of the requested type could not be read; it is skipped
    InvalidResource {
        resource_type: &'static str,
        id: Option<String>,
        reason: String,
    },
}

/// Receiver of [`PipelineEvent`]s
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::OrphanEncounter {
                encounter_id,
                patient,
            } => {
                tracing::warn!(
                    encounter_id = ?encounter_id,
                    patient = %patient,
                    "Dropping encounter that references an unknown patient"
                );
            }
            PipelineEvent::EncounterWithoutSubject { encounter_id } => {
                tracing::debug!(
                    encounter_id = ?encounter_id,
                    "Skipping encounter without subject reference"
                );
            }
            PipelineEvent::PatientWithoutId => {
                tracing::warn!("Skipping patient without logical id");
            }
            PipelineEvent::DuplicatePatient { patient } => {
                tracing::warn!(patient = %patient, "Ignoring duplicate patient");
            }
            PipelineEvent::MappingFailed { patient, reason } => {
                crate::log_patient_skipped!(patient, reason);
            }
            PipelineEvent::InvalidResource {
                resource_type,
                id,
                reason,
            } => {
                tracing::error!(
                    resource_type,
                    id = ?id,
                    error = %reason,
                    "Skipping resource that could not be read"
                );
            }
        }
    }
}

/// Forwards to another sink and counts the rejected resources per type
pub struct CountingEventSink<'a> {
    inner: &'a dyn EventSink,
    invalid_patients: AtomicUsize,
    invalid_encounters: AtomicUsize,
}

impl<'a> CountingEventSink<'a> {
    pub fn new(inner: &'a dyn EventSink) -> Self {
        Self {
            inner,
            invalid_patients: AtomicUsize::new(0),
            invalid_encounters: AtomicUsize::new(0),
        }
    }

    /// Patients that never reached the mapper
    pub fn invalid_patients(&self) -> usize {
        self.invalid_patients.load(Ordering::Relaxed)
    }

    pub fn invalid_encounters(&self) -> usize {
        self.invalid_encounters.load(Ordering::Relaxed)
    }
}

impl EventSink for CountingEventSink<'_> {
    fn emit(&self, event: PipelineEvent) {
        if let PipelineEvent::InvalidResource { resource_type, .. } = &event {
            let counter = match *resource_type {
                t if t == Patient::RESOURCE_TYPE => Some(&self.invalid_patients),
                t if t == Encounter::RESOURCE_TYPE => Some(&self.invalid_encounters),
                _ => None,
            };
            if let Some(counter) = counter {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.inner.emit(event);
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events emitted so far, in emission order
    pub fn events(&self) -> Vec<PipelineEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of orphaned encounters reported
    pub fn orphan_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::OrphanEncounter { .. }))
            .count()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: PipelineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

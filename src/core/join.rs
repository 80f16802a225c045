//! Patient/encounter join
//!
//! The patient side is materialised into an index first; encounters are then
//! pulled one at a time and attached to the patient their subject points at.

use super::events::{EventSink, PipelineEvent};
use crate::domain::{Encounter, Patient, PatientKey, Result};
use futures::{pin_mut, Stream, TryStreamExt};
use std::collections::HashMap;

/// A patient together with the encounters that reference it
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    pub key: PatientKey,
    pub patient: Patient,
    /// In retrieval order, not chronological
    pub encounters: Vec<Encounter>,
}

/// Joined patient records keyed by [`PatientKey`]
///
/// Iteration yields records in patient retrieval order.
#[derive(Debug, Default)]
pub struct JoinedRecords {
    records: Vec<PatientRecord>,
    index: HashMap<PatientKey, usize>,
    encounters_joined: usize,
    orphan_encounters: usize,
    encounters_without_subject: usize,
    skipped_patients: usize,
}

impl JoinedRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a patient to the index
    ///
    /// Patients without a usable id and repeated keys are reported and ignored.
    pub fn insert_patient(&mut self, patient: Patient, events: &dyn EventSink) {
        let Some(key) = patient.key() else {
            self.skipped_patients += 1;
            events.emit(PipelineEvent::PatientWithoutId);
            return;
        };

        if self.index.contains_key(&key) {
            self.skipped_patients += 1;
            events.emit(PipelineEvent::DuplicatePatient { patient: key });
            return;
        }

        self.index.insert(key.clone(), self.records.len());
        self.records.push(PatientRecord {
            key,
            patient,
            encounters: Vec::new(),
        });
    }

    /// Attaches an encounter to the patient its subject references
    ///
    /// Returns `true` if the encounter was joined.
    pub fn attach_encounter(&mut self, encounter: Encounter, events: &dyn EventSink) -> bool {
        let Some(key) = encounter.subject.as_ref().and_then(|s| s.patient_key()) else {
            self.encounters_without_subject += 1;
            events.emit(PipelineEvent::EncounterWithoutSubject {
                encounter_id: encounter.id,
            });
            return false;
        };

        match self.index.get(&key) {
            Some(&position) => {
                self.records[position].encounters.push(encounter);
                self.encounters_joined += 1;
                true
            }
            None => {
                self.orphan_encounters += 1;
                events.emit(PipelineEvent::OrphanEncounter {
                    encounter_id: encounter.id,
                    patient: key,
                });
                false
            }
        }
    }

    pub fn get(&self, key: &PatientKey) -> Option<&PatientRecord> {
        self.index.get(key).map(|&position| &self.records[position])
    }

    pub fn contains_key(&self, key: &PatientKey) -> bool {
        self.index.contains_key(key)
    }

    /// Number of joined patients
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatientRecord> {
        self.records.iter()
    }

    pub fn encounters_joined(&self) -> usize {
        self.encounters_joined
    }

    pub fn orphan_encounters(&self) -> usize {
        self.orphan_encounters
    }

    pub fn encounters_without_subject(&self) -> usize {
        self.encounters_without_subject
    }

    /// Patients left out for a missing id or a duplicate key
    pub fn skipped_patients(&self) -> usize {
        self.skipped_patients
    }
}

impl IntoIterator for JoinedRecords {
    type Item = PatientRecord;
    type IntoIter = std::vec::IntoIter<PatientRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a JoinedRecords {
    type Item = &'a PatientRecord;
    type IntoIter = std::slice::Iter<'a, PatientRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Joins a patient stream with an encounter stream
///
/// The patient stream is drained completely before the first encounter is
/// requested. Retrieval errors from either stream are returned as is.
pub async fn join_resources<P, E>(
    patients: P,
    encounters: E,
    events: &dyn EventSink,
) -> Result<JoinedRecords>
where
    P: Stream<Item = Result<Patient>>,
    E: Stream<Item = Result<Encounter>>,
{
    pin_mut!(patients);
    pin_mut!(encounters);

    let mut joined = JoinedRecords::new();

    while let Some(patient) = patients.try_next().await? {
        joined.insert_patient(patient, events);
    }
    tracing::info!(patients = joined.len(), "Indexed patients");

    while let Some(encounter) = encounters.try_next().await? {
        joined.attach_encounter(encounter, events);
    }

    tracing::info!(
        patients = joined.len(),
        encounters_joined = joined.encounters_joined,
        orphan_encounters = joined.orphan_encounters,
        encounters_without_subject = joined.encounters_without_subject,
        "Joined encounters to patients"
    );

    Ok(joined)
}

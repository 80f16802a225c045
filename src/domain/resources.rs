//! FHIR resource views consumed by the pipeline
//!
//! Only the members the CAPACITY mapping reads are modelled; everything else
//! in the server's JSON is ignored during deserialization. Dates are kept as
//! the strings the server sent so that malformed values become per-patient
//! mapping errors. An entry whose members have the wrong JSON type cannot be
//! read at all and is skipped during pagination.

use super::ids::PatientKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A resource type that can be searched for and paginated
pub trait FhirResource: DeserializeOwned + Send + 'static {
    /// Literal `resourceType` value, also the search path segment
    const RESOURCE_TYPE: &'static str;
}

/// External identifier of a patient (e.g. a pseudonymised study number)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Literal reference to another resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Reference {
    /// Builds a reference to the given patient
    pub fn to_patient(key: &PatientKey) -> Self {
        Self {
            reference: Some(key.as_str().to_string()),
        }
    }

    /// Patient key this reference points at, if it is a resolvable patient reference
    pub fn patient_key(&self) -> Option<PatientKey> {
        self.reference.as_deref().and_then(PatientKey::from_reference)
    }
}

/// Start and end of an encounter, as FHIR `dateTime` strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Patient resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    /// Administrative gender: male | female | other | unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

impl Patient {
    /// Join key of this patient (`Patient/{id}`), if it has a valid id
    pub fn key(&self) -> Option<PatientKey> {
        self.id
            .as_deref()
            .and_then(|id| PatientKey::for_patient_id(id).ok())
    }
}

impl FhirResource for Patient {
    const RESOURCE_TYPE: &'static str = "Patient";
}

/// Encounter resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

impl Encounter {
    /// Admission start as sent by the server
    pub fn start(&self) -> Option<&str> {
        self.period.as_ref().and_then(|p| p.start.as_deref())
    }

    /// Discharge end as sent by the server
    pub fn end(&self) -> Option<&str> {
        self.period.as_ref().and_then(|p| p.end.as_deref())
    }
}

impl FhirResource for Encounter {
    const RESOURCE_TYPE: &'static str = "Encounter";
}

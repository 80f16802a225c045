//! Domain identifier types with validation
//!
//! This module provides the newtype used to correlate Patient resources with
//! the Encounters that reference them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource type segment that prefixes every patient key
pub const PATIENT_RESOURCE_TYPE: &str = "Patient";

/// Join key between Patient and Encounter resources
///
/// Always the relative reference path `Patient/{id}`. Encounter subjects are
/// normalised to the same form, so a key built from a Patient compares equal
/// to a key built from any reference that points at it.
///
/// # Examples
///
/// ```
/// use capacity_mapping::domain::ids::PatientKey;
///
/// let from_patient = PatientKey::for_patient_id("123").unwrap();
/// let from_reference = PatientKey::from_reference("https://fhir.example.com/fhir/Patient/123").unwrap();
/// assert_eq!(from_patient, from_reference);
/// assert_eq!(from_patient.as_str(), "Patient/123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientKey(String);

impl PatientKey {
    /// Creates a key from a relative reference path such as `Patient/123`
    ///
    /// # Returns
    ///
    /// Returns `Err` if the path is not of the form `Patient/{id}`
    pub fn new(path: impl Into<String>) -> Result<Self, String> {
        let path = path.into();
        match path.split_once('/') {
            Some((PATIENT_RESOURCE_TYPE, id)) if is_valid_id(id) => Ok(Self(path)),
            _ => Err(format!(
                "Invalid patient key '{path}'. Expected format: Patient/{{id}}"
            )),
        }
    }

    /// Builds the key for a Patient resource with the given logical id
    pub fn for_patient_id(id: &str) -> Result<Self, String> {
        if !is_valid_id(id) {
            return Err(format!("Invalid patient id '{id}'"));
        }
        Ok(Self(format!("{PATIENT_RESOURCE_TYPE}/{id}")))
    }

    /// Resolves a literal reference to the patient key it points at
    ///
    /// Accepts relative (`Patient/1`), absolute (`https://host/fhir/Patient/1`)
    /// and versioned (`Patient/1/_history/2`) references. Returns `None` for
    /// contained (`#p1`), conditional (`Patient?identifier=..`) and `urn:`
    /// references, and for references to other resource types.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.starts_with('#') || reference.starts_with("urn:") || reference.contains('?')
        {
            return None;
        }

        let mut segments: Vec<&str> = reference.split('/').filter(|s| !s.is_empty()).collect();
        if let Some(history) = segments.iter().position(|s| *s == "_history") {
            segments.truncate(history);
        }

        match segments.as_slice() {
            [.., resource_type, id] if *resource_type == PATIENT_RESOURCE_TYPE => {
                Self::for_patient_id(id).ok()
            }
            _ => None,
        }
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the logical id part of the key
    pub fn id(&self) -> &str {
        &self.0[PATIENT_RESOURCE_TYPE.len() + 1..]
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// FHIR logical id rule: 1-64 characters from `[A-Za-z0-9-.]`
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

impl fmt::Display for PatientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PatientKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! CAPACITY REDCap codebook
//!
//! Destination field names, the value tables of the categorical fields and
//! the two REDCap events a patient is split across. The tables are plain data
//! so they can be checked for completeness on their own.

use crate::domain::{CodebookError, MappingError};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Event discriminator field of every flat record
pub const REDCAP_EVENT_NAME: &str = "redcap_event_name";

/// Baseline (admission) event
pub const BASELINE_CAPACITY: &str = "baseline_capacity_arm_1";

/// Discharge (outcome) event
pub const CAPACITY_OUTCOME: &str = "discharge_capacity_arm_1";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A value that can be written to a codebook field
pub trait CodebookValue: PartialEq {
    /// Key used in error messages and value tables
    fn label(&self) -> String;

    /// Representation for free-form fields
    fn to_wire(&self) -> Value;
}

/// Codebook field descriptor
///
/// `mapping` lists `(key, code)` pairs. A `None` key gives the code used when
/// the value is absent. Fields without a mapping are written as is.
#[derive(Debug)]
pub struct Variable<K: 'static> {
    name: &'static str,
    mapping: Option<&'static [(Option<K>, i64)]>,
}

impl<K: 'static> Variable<K> {
    /// Free-form field
    pub const fn free(name: &'static str) -> Self {
        Self {
            name,
            mapping: None,
        }
    }

    /// Field encoded through a value table
    pub const fn mapped(name: &'static str, mapping: &'static [(Option<K>, i64)]) -> Self {
        Self {
            name,
            mapping: Some(mapping),
        }
    }

    /// Destination field name
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub fn mapping(&self) -> Option<&'static [(Option<K>, i64)]> {
        self.mapping
    }
}

impl<K: CodebookValue + 'static> Variable<K> {
    /// Looks a value up in the field's table
    ///
    /// Returns `Ok(None)` for an absent value the table has no default for.
    ///
    /// # Errors
    ///
    /// `UnmappedValue` if the value is present but not in the table, or if the
    /// field has no table at all.
    pub fn code(&self, value: Option<&K>) -> Result<Option<i64>, CodebookError> {
        let unmapped = || CodebookError::UnmappedValue {
            field: self.name,
            value: value.map(CodebookValue::label).unwrap_or_default(),
        };

        let Some(table) = self.mapping else {
            return Err(unmapped());
        };
        match table.iter().find(|(key, _)| key.as_ref() == value) {
            Some((_, code)) => Ok(Some(*code)),
            None if value.is_none() => Ok(None),
            None => Err(unmapped()),
        }
    }

    /// Wire value of this field
    ///
    /// # Errors
    ///
    /// Same as [`code`](Self::code) for fields with a table.
    pub fn encode(&self, value: Option<&K>) -> Result<Value, CodebookError> {
        if self.mapping.is_some() {
            return Ok(self.code(value)?.map(Value::from).unwrap_or(Value::Null));
        }
        Ok(value.map(CodebookValue::to_wire).unwrap_or(Value::Null))
    }
}

/// Administrative sex as recorded in the codebook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Male,
    Female,
    Other,
    Unknown,
}

impl Sex {
    pub const ALL: [Sex; 4] = [Sex::Male, Sex::Female, Sex::Other, Sex::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Other => "other",
            Sex::Unknown => "unknown",
        }
    }
}

impl FromStr for Sex {
    type Err = MappingError;

    /// Parses a FHIR administrative gender code
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sex::ALL
            .into_iter()
            .find(|sex| sex.as_str() == s)
            .ok_or_else(|| MappingError::UnknownCategory {
                field: "gender",
                value: s.to_string(),
            })
    }
}

/// Unit of `age_estimateyears`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeUnit {
    Months,
    Years,
}

impl AgeUnit {
    pub const ALL: [AgeUnit; 2] = [AgeUnit::Months, AgeUnit::Years];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeUnit::Months => "months",
            AgeUnit::Years => "years",
        }
    }
}

/// Discharge outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    DischargedAlive,
    Transfer,
    Death,
    PalliativeDischarge,
    Unknown,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::DischargedAlive,
        Outcome::Transfer,
        Outcome::Death,
        Outcome::PalliativeDischarge,
        Outcome::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::DischargedAlive => "discharged_alive",
            Outcome::Transfer => "transfer",
            Outcome::Death => "death",
            Outcome::PalliativeDischarge => "palliative_discharge",
            Outcome::Unknown => "unknown",
        }
    }
}

macro_rules! labelled_value {
    ($($ty:ty),*) => {
        $(
            impl CodebookValue for $ty {
                fn label(&self) -> String {
                    self.as_str().to_string()
                }

                fn to_wire(&self) -> Value {
                    Value::from(self.as_str())
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

labelled_value!(Sex, AgeUnit, Outcome);

impl CodebookValue for bool {
    fn label(&self) -> String {
        self.to_string()
    }

    fn to_wire(&self) -> Value {
        Value::Bool(*self)
    }
}

impl CodebookValue for i64 {
    fn label(&self) -> String {
        self.to_string()
    }

    fn to_wire(&self) -> Value {
        Value::from(*self)
    }
}

impl CodebookValue for String {
    fn label(&self) -> String {
        self.clone()
    }

    fn to_wire(&self) -> Value {
        Value::from(self.as_str())
    }
}

impl CodebookValue for NaiveDate {
    fn label(&self) -> String {
        self.format(DATE_FORMAT).to_string()
    }

    fn to_wire(&self) -> Value {
        Value::from(self.label())
    }
}

pub const PATIENT_ID: Variable<String> = Variable::free("subjid");

pub const SEX: Variable<Sex> = Variable::mapped(
    "sex",
    &[
        (Some(Sex::Male), 1),
        (Some(Sex::Female), 2),
        (Some(Sex::Other), -1),
        (Some(Sex::Unknown), -1),
        (None, -1),
    ],
);

pub const AGE_ESTIMATE: Variable<i64> = Variable::free("age_estimateyears");

pub const AGE_ESTIMATE_UNIT: Variable<AgeUnit> = Variable::mapped(
    "age_estimateyearsu",
    &[(Some(AgeUnit::Months), 1), (Some(AgeUnit::Years), 2)],
);

pub const ADMISSION_DATE: Variable<NaiveDate> = Variable::free("admission_date");

pub const ADMISSION_ANY_DATE: Variable<NaiveDate> = Variable::free("admission_any_date");

pub const OUTCOME: Variable<Outcome> = Variable::mapped(
    "capdis_outcome",
    &[
        (Some(Outcome::DischargedAlive), 1),
        (Some(Outcome::Transfer), 3),
        (Some(Outcome::Death), 4),
        (Some(Outcome::PalliativeDischarge), 5),
        (Some(Outcome::Unknown), 6),
        (None, 6),
    ],
);

pub const OUTCOME_DATE_KNOWN: Variable<bool> =
    Variable::mapped("capdis_date", &[(Some(true), 1), (Some(false), 2)]);

pub const OUTCOME_DATE: Variable<NaiveDate> = Variable::free("capdis_outcomedate");

/// One flat REDCap record: field name to wire value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlatRecord(Map<String, Value>);

impl FlatRecord {
    /// Starts a record for the given event
    pub fn for_event(event: &str) -> Self {
        let mut record = Self::default();
        record.insert(REDCAP_EVENT_NAME, Value::from(event));
        record
    }

    fn insert(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }

    fn set<K: CodebookValue>(
        &mut self,
        variable: &Variable<K>,
        value: Option<&K>,
    ) -> Result<(), CodebookError> {
        let encoded = variable.encode(value)?;
        self.insert(variable.name(), encoded);
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Event this record belongs to
    pub fn event(&self) -> Option<&str> {
        self.get(REDCAP_EVENT_NAME).and_then(Value::as_str)
    }

    /// `subjid` of the record
    pub fn subject_id(&self) -> Option<&str> {
        self.get(PATIENT_ID.name()).and_then(Value::as_str)
    }

    /// Field names, sorted
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// One patient mapped to the codebook
///
/// Built once by the record mapper and consumed by [`to_records`](Self::to_records).
#[derive(Debug, Clone, PartialEq)]
pub struct CodebookRecord {
    patient_id: String,
    sex: Option<Sex>,
    age_estimate: Option<i64>,
    age_estimate_unit: Option<AgeUnit>,
    admission_date: Option<NaiveDate>,
    admission_any_date: Option<NaiveDate>,
    outcome_date_known: Option<bool>,
    outcome_date: Option<NaiveDate>,
}

impl CodebookRecord {
    pub fn builder(patient_id: impl Into<String>) -> CodebookRecordBuilder {
        CodebookRecordBuilder {
            record: CodebookRecord {
                patient_id: patient_id.into(),
                sex: None,
                age_estimate: None,
                age_estimate_unit: None,
                admission_date: None,
                admission_any_date: None,
                outcome_date_known: None,
                outcome_date: None,
            },
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn sex(&self) -> Option<Sex> {
        self.sex
    }

    pub fn age_estimate(&self) -> Option<i64> {
        self.age_estimate
    }

    pub fn age_estimate_unit(&self) -> Option<AgeUnit> {
        self.age_estimate_unit
    }

    pub fn admission_date(&self) -> Option<NaiveDate> {
        self.admission_date
    }

    pub fn admission_any_date(&self) -> Option<NaiveDate> {
        self.admission_any_date
    }

    pub fn outcome_date_known(&self) -> Option<bool> {
        self.outcome_date_known
    }

    pub fn outcome_date(&self) -> Option<NaiveDate> {
        self.outcome_date
    }

    /// Splits the record into its baseline and discharge event records
    ///
    /// Both records carry `subjid`; no other field appears in both.
    ///
    /// # Errors
    ///
    /// Returns `UnmappedValue` if a categorical value has no code.
    pub fn to_records(&self) -> Result<[FlatRecord; 2], CodebookError> {
        let patient_id = Some(&self.patient_id);

        let mut baseline = FlatRecord::for_event(BASELINE_CAPACITY);
        baseline.set(&PATIENT_ID, patient_id)?;
        baseline.set(&SEX, self.sex.as_ref())?;
        baseline.set(&AGE_ESTIMATE, self.age_estimate.as_ref())?;
        baseline.set(&AGE_ESTIMATE_UNIT, self.age_estimate_unit.as_ref())?;
        baseline.set(&ADMISSION_DATE, self.admission_date.as_ref())?;
        baseline.set(&ADMISSION_ANY_DATE, self.admission_any_date.as_ref())?;

        let mut discharge = FlatRecord::for_event(CAPACITY_OUTCOME);
        discharge.set(&PATIENT_ID, patient_id)?;
        discharge.set(&OUTCOME_DATE_KNOWN, self.outcome_date_known.as_ref())?;
        discharge.set(&OUTCOME_DATE, self.outcome_date.as_ref())?;

        Ok([baseline, discharge])
    }
}

/// Builder for [`CodebookRecord`]
#[derive(Debug, Clone)]
pub struct CodebookRecordBuilder {
    record: CodebookRecord,
}

impl CodebookRecordBuilder {
    pub fn sex(mut self, sex: Option<Sex>) -> Self {
        self.record.sex = sex;
        self
    }

    pub fn age(mut self, age: i64, unit: AgeUnit) -> Self {
        self.record.age_estimate = Some(age);
        self.record.age_estimate_unit = Some(unit);
        self
    }

    pub fn admission_date(mut self, date: NaiveDate) -> Self {
        self.record.admission_date = Some(date);
        self
    }

    pub fn admission_any_date(mut self, date: NaiveDate) -> Self {
        self.record.admission_any_date = Some(date);
        self
    }

    pub fn outcome_date_known(mut self, known: bool) -> Self {
        self.record.outcome_date_known = Some(known);
        self
    }

    pub fn outcome_date(mut self, date: NaiveDate) -> Self {
        self.record.outcome_date = Some(date);
        self
    }

    pub fn build(self) -> CodebookRecord {
        self.record
    }
}

//! Record mapper: FHIR patient and encounters to a [`CodebookRecord`]
//!
//! Pure functions without I/O. Only the first encounter of a patient is
//! considered.

use super::codebook::{AgeUnit, CodebookRecord, Sex};
use super::join::PatientRecord;
use crate::domain::{Encounter, MappingError, Patient};
use chrono::{DateTime, Datelike, Months, NaiveDate};

/// Maps one patient and its encounters to the codebook
///
/// # Errors
///
/// Returns a [`MappingError`] if the gender is not a known category, a date
/// cannot be parsed, a required field is missing, or the admission lies
/// before the birth date.
///
/// # Example
///
/// ```
/// use capacity_mapping::core::mapping::map_patient;
/// use capacity_mapping::domain::Patient;
///
/// let patient = Patient {
///     id: Some("1".to_string()),
///     gender: Some("male".to_string()),
///     ..Default::default()
/// };
/// let record = map_patient(&patient, &[]).unwrap();
/// assert_eq!(record.patient_id(), "Patient/1");
/// assert_eq!(record.outcome_date_known(), Some(false));
/// ```
pub fn map_patient(
    patient: &Patient,
    encounters: &[Encounter],
) -> Result<CodebookRecord, MappingError> {
    let sex = patient
        .gender
        .as_deref()
        .map(str::parse::<Sex>)
        .transpose()?;

    let builder = CodebookRecord::builder(subject_id(patient)?).sex(sex);

    let Some(encounter) = encounters.first() else {
        return Ok(builder.outcome_date_known(false).build());
    };

    let birth_date = parse_date(
        "birthDate",
        patient
            .birth_date
            .as_deref()
            .ok_or(MappingError::MissingField("birthDate"))?,
    )?;
    let admission = parse_date(
        "period.start",
        encounter
            .start()
            .ok_or(MappingError::MissingField("period.start"))?,
    )?;
    let (age, unit) = age_at(birth_date, admission)?;

    let builder = builder
        .age(age, unit)
        .admission_date(admission)
        .admission_any_date(admission);

    let record = match encounter.end() {
        Some(end) => builder
            .outcome_date_known(true)
            .outcome_date(parse_date("period.end", end)?),
        None => builder.outcome_date_known(false),
    };

    Ok(record.build())
}

/// Maps a joined patient record
pub fn map_record(record: &PatientRecord) -> Result<CodebookRecord, MappingError> {
    map_patient(&record.patient, &record.encounters)
}

/// `subjid` of a patient
///
/// The first identifier's value when the patient has identifiers, otherwise
/// the relative reference path.
pub fn subject_id(patient: &Patient) -> Result<String, MappingError> {
    match patient.identifier.first() {
        Some(identifier) => identifier
            .value
            .clone()
            .ok_or(MappingError::MissingField("identifier.value")),
        None => patient
            .key()
            .map(|key| key.into_inner())
            .ok_or(MappingError::MissingField("id")),
    }
}

/// Age at `date` for someone born on `birth_date`
///
/// Whole calendar months are counted the way `relativedelta` does: adding the
/// month count to the birth date clamps to the end of shorter months. Ages
/// under one year are reported in months, all others in years.
///
/// # Errors
///
/// `AdmissionBeforeBirth` if `date` precedes `birth_date`.
pub fn age_at(birth_date: NaiveDate, date: NaiveDate) -> Result<(i64, AgeUnit), MappingError> {
    let before_birth = || MappingError::AdmissionBeforeBirth {
        admission: date.to_string(),
        birth: birth_date.to_string(),
    };

    if date < birth_date {
        return Err(before_birth());
    }

    let mut months = i64::from(date.year() - birth_date.year()) * 12
        + i64::from(date.month())
        - i64::from(birth_date.month());

    let anniversary = u32::try_from(months)
        .ok()
        .and_then(|m| birth_date.checked_add_months(Months::new(m)))
        .ok_or_else(before_birth)?;
    if anniversary > date {
        months -= 1;
    }

    let years = months / 12;
    if years < 1 {
        Ok((months, AgeUnit::Months))
    } else {
        Ok((years, AgeUnit::Years))
    }
}

/// Parses a FHIR `date` or `dateTime` into a calendar date
///
/// Partial dates (`YYYY`, `YYYY-MM`) resolve to their first day. A
/// `dateTime` keeps the date as written in its own offset.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, MappingError> {
    let invalid = || MappingError::InvalidDate {
        field,
        value: value.to_string(),
    };

    if value.contains('T') {
        return DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.date_naive())
            .map_err(|_| invalid());
    }

    let shape_ok = |len: usize| {
        value.len() == len
            && value
                .char_indices()
                .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() })
    };

    let padded = match value.len() {
        4 if shape_ok(4) => format!("{value}-01-01"),
        7 if shape_ok(7) => format!("{value}-01"),
        10 if shape_ok(10) => value.to_string(),
        _ => return Err(invalid()),
    };

    NaiveDate::parse_from_str(&padded, "%Y-%m-%d").map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identifier, Period, Reference};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn patient() -> Patient {
        Patient {
            id: Some("42".to_string()),
            identifier: vec![],
            gender: Some("female".to_string()),
            birth_date: Some("1990-01-02".to_string()),
        }
    }

    fn encounter(start: Option<&str>, end: Option<&str>) -> Encounter {
        Encounter {
            id: Some("e1".to_string()),
            status: Some("finished".to_string()),
            subject: Some(Reference {
                reference: Some("Patient/42".to_string()),
            }),
            period: Some(Period {
                start: start.map(str::to_string),
                end: end.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_age_in_years() {
        assert_eq!(
            age_at(date(1990, 1, 2), date(2021, 4, 20)).unwrap(),
            (31, AgeUnit::Years)
        );
    }

    #[test]
    fn test_age_day_before_birthday() {
        assert_eq!(
            age_at(date(1990, 4, 21), date(2021, 4, 20)).unwrap(),
            (30, AgeUnit::Years)
        );
        assert_eq!(
            age_at(date(1990, 4, 20), date(2021, 4, 20)).unwrap(),
            (31, AgeUnit::Years)
        );
    }

    #[test]
    fn test_age_under_one_year_is_in_months() {
        assert_eq!(
            age_at(date(2020, 8, 15), date(2021, 4, 20)).unwrap(),
            (8, AgeUnit::Months)
        );
        assert_eq!(
            age_at(date(2021, 4, 1), date(2021, 4, 20)).unwrap(),
            (0, AgeUnit::Months)
        );
        assert_eq!(
            age_at(date(2020, 4, 21), date(2021, 4, 20)).unwrap(),
            (11, AgeUnit::Months)
        );
    }

    #[test]
    fn test_age_month_end_clamping() {
        // Jan 31 + 1 month clamps to Feb 28
        assert_eq!(
            age_at(date(2021, 1, 31), date(2021, 2, 28)).unwrap(),
            (1, AgeUnit::Months)
        );
        assert_eq!(
            age_at(date(2021, 1, 31), date(2021, 2, 27)).unwrap(),
            (0, AgeUnit::Months)
        );
    }

    #[test]
    fn test_age_leap_day_birth() {
        assert_eq!(
            age_at(date(2000, 2, 29), date(2001, 2, 28)).unwrap(),
            (1, AgeUnit::Years)
        );
        assert_eq!(
            age_at(date(2000, 2, 29), date(2004, 2, 28)).unwrap(),
            (3, AgeUnit::Years)
        );
    }

    #[test]
    fn test_admission_before_birth() {
        assert!(matches!(
            age_at(date(2021, 4, 20), date(2021, 4, 19)),
            Err(MappingError::AdmissionBeforeBirth { .. })
        ));
    }

    #[test]
    fn test_parse_date_forms() {
        assert_eq!(parse_date("f", "2021-04-20").unwrap(), date(2021, 4, 20));
        assert_eq!(parse_date("f", "2021-04").unwrap(), date(2021, 4, 1));
        assert_eq!(parse_date("f", "2021").unwrap(), date(2021, 1, 1));
        assert_eq!(
            parse_date("f", "2021-04-20T23:30:00+02:00").unwrap(),
            date(2021, 4, 20)
        );
        assert_eq!(
            parse_date("f", "2021-04-20T00:15:00Z").unwrap(),
            date(2021, 4, 20)
        );
    }

    #[test]
    fn test_parse_date_rejects_malformed() {
        for value in ["", "20-04-2021", "2021-4-20", "2021-02-30", "yesterday", "2021-04-20T"] {
            assert_eq!(
                parse_date("birthDate", value),
                Err(MappingError::InvalidDate {
                    field: "birthDate",
                    value: value.to_string(),
                }),
                "{value}"
            );
        }
    }

    #[test]
    fn test_subject_id_prefers_first_identifier() {
        let patient = Patient {
            identifier: vec![
                Identifier {
                    system: Some("urn:capacity".to_string()),
                    value: Some("CAP-001".to_string()),
                },
                Identifier {
                    system: None,
                    value: Some("OTHER".to_string()),
                },
            ],
            ..patient()
        };
        assert_eq!(subject_id(&patient).unwrap(), "CAP-001");
    }

    #[test]
    fn test_subject_id_falls_back_to_reference_path() {
        assert_eq!(subject_id(&patient()).unwrap(), "Patient/42");
    }

    #[test]
    fn test_subject_id_missing() {
        let without_value = Patient {
            identifier: vec![Identifier::default()],
            ..patient()
        };
        assert_eq!(
            subject_id(&without_value),
            Err(MappingError::MissingField("identifier.value"))
        );
        assert_eq!(
            subject_id(&Patient::default()),
            Err(MappingError::MissingField("id"))
        );
    }

    #[test]
    fn test_map_patient_with_finished_encounter() {
        let record = map_patient(
            &patient(),
            &[encounter(Some("2021-04-20T08:00:00+02:00"), Some("2021-05-20"))],
        )
        .unwrap();

        assert_eq!(record.patient_id(), "Patient/42");
        assert_eq!(record.sex(), Some(Sex::Female));
        assert_eq!(record.age_estimate(), Some(31));
        assert_eq!(record.age_estimate_unit(), Some(AgeUnit::Years));
        assert_eq!(record.admission_date(), Some(date(2021, 4, 20)));
        assert_eq!(record.admission_any_date(), record.admission_date());
        assert_eq!(record.outcome_date_known(), Some(true));
        assert_eq!(record.outcome_date(), Some(date(2021, 5, 20)));
    }

    #[test]
    fn test_map_patient_with_open_encounter() {
        let record = map_patient(&patient(), &[encounter(Some("2021-04-20"), None)]).unwrap();
        assert_eq!(record.outcome_date_known(), Some(false));
        assert_eq!(record.outcome_date(), None);
    }

    #[test]
    fn test_map_patient_uses_first_encounter_only() {
        let record = map_patient(
            &patient(),
            &[
                encounter(Some("2021-04-20"), None),
                encounter(Some("2022-01-10"), Some("2022-01-12")),
            ],
        )
        .unwrap();
        assert_eq!(record.admission_date(), Some(date(2021, 4, 20)));
        assert_eq!(record.outcome_date_known(), Some(false));
    }

    #[test]
    fn test_map_patient_without_encounters() {
        let record = map_patient(&patient(), &[]).unwrap();
        assert_eq!(record.age_estimate(), None);
        assert_eq!(record.age_estimate_unit(), None);
        assert_eq!(record.admission_date(), None);
        assert_eq!(record.admission_any_date(), None);
        assert_eq!(record.outcome_date(), None);
        assert_eq!(record.outcome_date_known(), Some(false));
    }

    #[test]
    fn test_map_patient_without_gender() {
        let patient = Patient {
            gender: None,
            ..patient()
        };
        assert_eq!(map_patient(&patient, &[]).unwrap().sex(), None);
    }

    #[test]
    fn test_map_patient_errors() {
        let unknown_gender = Patient {
            gender: Some("robot".to_string()),
            ..patient()
        };
        assert!(matches!(
            map_patient(&unknown_gender, &[]),
            Err(MappingError::UnknownCategory { field: "gender", .. })
        ));

        let bad_birth = Patient {
            birth_date: Some("02/01/1990".to_string()),
            ..patient()
        };
        assert!(matches!(
            map_patient(&bad_birth, &[encounter(Some("2021-04-20"), None)]),
            Err(MappingError::InvalidDate { field: "birthDate", .. })
        ));

        let no_birth = Patient {
            birth_date: None,
            ..patient()
        };
        assert_eq!(
            map_patient(&no_birth, &[encounter(Some("2021-04-20"), None)]),
            Err(MappingError::MissingField("birthDate"))
        );

        assert_eq!(
            map_patient(&patient(), &[encounter(None, Some("2021-05-20"))]),
            Err(MappingError::MissingField("period.start"))
        );

        assert!(matches!(
            map_patient(&patient(), &[encounter(Some("2021-04-20"), Some("soon"))]),
            Err(MappingError::InvalidDate { field: "period.end", .. })
        ));
    }

    #[test]
    fn test_map_patient_is_deterministic() {
        let encounters = [encounter(Some("2021-04-20"), Some("2021-05-20"))];
        let first = map_patient(&patient(), &encounters).unwrap();
        let second = map_patient(&patient(), &encounters).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_records().unwrap(), second.to_records().unwrap());
    }
}

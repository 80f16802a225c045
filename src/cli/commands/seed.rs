//! Seed command implementation
//!
//! Fills a test FHIR server with random patients, each with one encounter
//! referencing it, so that an export has something to work on.

use crate::adapters::fhir::{FhirClient, FhirSearch};
use crate::config::{load_config, FhirConfig};
use crate::core::codebook::SEX;
use crate::domain::{
    CapacityError, Encounter, FhirError, FhirResource, Patient, PatientKey, Period, Reference,
    Result,
};
use chrono::{Days, NaiveDate};
use clap::Args;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;

/// Encounter statuses the generator picks from
pub const ENCOUNTER_STATUSES: [&str; 7] = [
    "planned",
    "arrived",
    "triaged",
    "in-progress",
    "onleave",
    "finished",
    "cancelled",
];

const EARLIEST_BIRTH: (i32, u32, u32) = (1930, 1, 1);
const LATEST_BIRTH: (i32, u32, u32) = (2015, 12, 31);
const LATEST_ADMISSION: (i32, u32, u32) = (2022, 12, 31);
const MAX_STAY_DAYS: u64 = 60;

/// Arguments for the seed command
#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Number of patients to create
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// FHIR base URL; when set the configuration file is not read
    #[arg(long)]
    pub fhir_url: Option<String>,

    /// Seed for the random generator, for reproducible data
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SeedArgs {
    /// Execute the seed command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let fhir_config = match &self.fhir_url {
            Some(url) => FhirConfig {
                base_url: url.clone(),
                ..Default::default()
            },
            None => match load_config(config_path) {
                Ok(config) => config.fhir,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load configuration");
                    eprintln!("Failed to load configuration: {e}");
                    return Ok(2);
                }
            },
        };

        let client = match FhirClient::new(fhir_config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to initialize FHIR client: {e}");
                return Ok(4);
            }
        };

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        println!("🌱 Seeding {} with {} patients...", client.base_url(), self.count);

        match seed_server(&client, self.count, &mut rng).await {
            Ok(created) => {
                println!("✅ Created {created} patients with one encounter each");
                Ok(0)
            }
            Err(e) => {
                tracing::error!(error = %e, "Seeding failed");
                eprintln!("Seeding failed: {e}");
                Ok(5)
            }
        }
    }
}

/// Creates `count` patients, each followed by one encounter for it
///
/// Returns the number of patient/encounter pairs created.
///
/// # Errors
///
/// Stops at the first resource the server does not accept.
pub async fn seed_server<R: Rng + ?Sized>(
    client: &FhirClient,
    count: usize,
    rng: &mut R,
) -> Result<usize> {
    for n in 0..count {
        let (patient, birth_date) = random_patient(rng);
        let created = client
            .create(Patient::RESOURCE_TYPE, &to_resource_json(&patient)?)
            .await?;

        let id = created.get("id").and_then(Value::as_str).ok_or_else(|| {
            FhirError::InvalidResponse("Created patient has no id".to_string())
        })?;
        let key = PatientKey::for_patient_id(id).map_err(FhirError::InvalidResponse)?;

        let encounter = random_encounter(rng, &key, birth_date);
        client
            .create(Encounter::RESOURCE_TYPE, &to_resource_json(&encounter)?)
            .await?;

        tracing::debug!(patient = %key, created = n + 1, "Seeded patient");
    }

    tracing::info!(count, "Seeding completed");
    Ok(count)
}

/// Random patient with a gender drawn from the codebook's sex categories
///
/// The absent category leaves `gender` unset. Also returns the birth date so
/// that encounters can be placed after it.
pub fn random_patient<R: Rng + ?Sized>(rng: &mut R) -> (Patient, NaiveDate) {
    let gender = SEX
        .mapping()
        .and_then(|table| table.choose(rng))
        .and_then(|(sex, _)| sex.as_ref())
        .map(|sex| sex.as_str().to_string());

    let birth_date = random_date(rng, ymd(EARLIEST_BIRTH), ymd(LATEST_BIRTH));

    let patient = Patient {
        gender,
        birth_date: Some(birth_date.format("%Y-%m-%d").to_string()),
        ..Default::default()
    };
    (patient, birth_date)
}

/// Random encounter for `subject`, starting on or after `birth_date`
///
/// Only finished encounters carry a period end.
pub fn random_encounter<R: Rng + ?Sized>(
    rng: &mut R,
    subject: &PatientKey,
    birth_date: NaiveDate,
) -> Encounter {
    let status = ENCOUNTER_STATUSES
        .choose(rng)
        .copied()
        .unwrap_or("finished");

    let latest = ymd(LATEST_ADMISSION).max(birth_date);
    let start = random_date(rng, birth_date, latest);
    let end = (status == "finished")
        .then(|| start.checked_add_days(Days::new(rng.gen_range(1..=MAX_STAY_DAYS))))
        .flatten();

    Encounter {
        status: Some(status.to_string()),
        subject: Some(Reference::to_patient(subject)),
        period: Some(Period {
            start: Some(start.format("%Y-%m-%d").to_string()),
            end: end.map(|d| d.format("%Y-%m-%d").to_string()),
        }),
        ..Default::default()
    }
}

fn random_date<R: Rng + ?Sized>(rng: &mut R, from: NaiveDate, to: NaiveDate) -> NaiveDate {
    let span = (to - from).num_days().max(0) as u64;
    from.checked_add_days(Days::new(rng.gen_range(0..=span)))
        .unwrap_or(from)
}

fn ymd((year, month, day): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn to_resource_json<T: FhirResource + Serialize>(resource: &T) -> Result<Value> {
    let mut value = serde_json::to_value(resource)?;
    match value.as_object_mut() {
        Some(object) => {
            object.insert(
                "resourceType".to_string(),
                Value::String(T::RESOURCE_TYPE.to_string()),
            );
            Ok(value)
        }
        None => Err(CapacityError::Serialization(format!(
            "{} did not serialize to an object",
            T::RESOURCE_TYPE
        ))),
    }
}

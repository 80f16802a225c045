//! End-to-end tests for the export pipeline
//!
//! The coordinator is driven by an in-memory FHIR server and a recording
//! registry, plus one run over HTTP against mock servers.

use async_trait::async_trait;
use capacity_mapping::adapters::fhir::{Bundle, FhirSearch};
use capacity_mapping::adapters::redcap::RecordSink;
use capacity_mapping::config::parse_config;
use capacity_mapping::core::codebook::{
    FlatRecord, BASELINE_CAPACITY, CAPACITY_OUTCOME, REDCAP_EVENT_NAME,
};
use capacity_mapping::core::events::{CollectingEventSink, PipelineEvent};
use capacity_mapping::core::export::{ExportCoordinator, ExportOptions};
use capacity_mapping::domain::{CapacityError, FhirError, RegistryError, Result};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// FHIR server holding every resource type as a list of pages
#[derive(Default)]
struct InMemoryServer {
    pages: HashMap<String, Bundle>,
    fail_url: Option<String>,
}

impl InMemoryServer {
    fn with_resources(
        mut self,
        resource_type: &str,
        resources: Vec<Value>,
        page_size: usize,
    ) -> Self {
        let chunks: Vec<Vec<Value>> = resources
            .chunks(page_size.max(1))
            .map(<[Value]>::to_vec)
            .collect();
        let count = chunks.len().max(1);
        let mut chunks = chunks.into_iter();

        for page in 0..count {
            let next = (page + 1 < count).then(|| page_url(resource_type, page + 1));
            let bundle = Bundle::searchset(chunks.next().unwrap_or_default(), next.as_deref());
            self.pages.insert(page_url(resource_type, page), bundle);
        }
        self
    }

    fn failing_at(mut self, url: &str) -> Self {
        self.fail_url = Some(url.to_string());
        self
    }
}

fn page_url(resource_type: &str, page: usize) -> String {
    format!("mem://fhir/{resource_type}?page={page}")
}

#[async_trait]
impl FhirSearch for InMemoryServer {
    async fn search(&self, resource_type: &str) -> Result<Bundle> {
        self.fetch_page(&page_url(resource_type, 0)).await
    }

    async fn fetch_page(&self, url: &str) -> Result<Bundle> {
        if self.fail_url.as_deref() == Some(url) {
            return Err(FhirError::ServerError {
                status: 502,
                message: "bad gateway".to_string(),
            }
            .into());
        }
        Ok(self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| Bundle::searchset(Vec::new(), None)))
    }

    fn base_url(&self) -> &str {
        "mem://fhir"
    }
}

/// Registry remembering every import call
#[derive(Default)]
struct RecordingRegistry {
    calls: AtomicUsize,
    records: Mutex<Vec<FlatRecord>>,
    reject: bool,
}

#[async_trait]
impl RecordSink for RecordingRegistry {
    async fn import_records(&self, records: &[FlatRecord]) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(RegistryError::ImportRejected {
                status: 400,
                message: "invalid field".to_string(),
            }
            .into());
        }
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(records.len())
    }

    fn destination(&self) -> &str {
        "memory"
    }
}

fn patient(id: &str, birth_date: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "identifier": [{"value": format!("CAP-{id}")}],
        "gender": "female",
        "birthDate": birth_date
    })
}

fn encounter(id: &str, subject: &str) -> Value {
    json!({
        "resourceType": "Encounter",
        "id": id,
        "status": "finished",
        "subject": {"reference": subject},
        "period": {"start": "2021-04-20T08:00:00+02:00", "end": "2021-05-02"}
    })
}

fn patients(n: usize) -> Vec<Value> {
    (1..=n).map(|i| patient(&i.to_string(), "1990-01-02")).collect()
}

fn encounters_for(n: usize) -> Vec<Value> {
    (1..=n)
        .map(|i| encounter(&format!("e{i}"), &format!("Patient/{i}")))
        .collect()
}

fn coordinator(
    server: InMemoryServer,
    registry: Arc<RecordingRegistry>,
    dry_run: bool,
) -> ExportCoordinator {
    ExportCoordinator::with_clients(Arc::new(server), registry, ExportOptions { dry_run })
}

#[tokio::test]
async fn test_every_patient_becomes_two_records() {
    let server = InMemoryServer::default()
        .with_resources("Patient", patients(7), 3)
        .with_resources("Encounter", encounters_for(7), 2);
    let registry = Arc::new(RecordingRegistry::default());

    let summary = coordinator(server, registry.clone(), false)
        .execute_export()
        .await
        .unwrap();

    assert_eq!(summary.total_patients, 7);
    assert_eq!(summary.successful, 7);
    assert_eq!(summary.records_produced, 14);
    assert_eq!(summary.records_uploaded, 14);
    assert!(summary.is_successful());
    assert_eq!(registry.calls.load(Ordering::SeqCst), 1);

    let records = registry.records.lock().unwrap();
    let mut per_subject: HashMap<&str, Vec<&str>> = HashMap::new();
    for record in records.iter() {
        per_subject
            .entry(record.subject_id().unwrap())
            .or_default()
            .push(record.event().unwrap());
    }
    assert_eq!(per_subject.len(), 7);
    for events in per_subject.values() {
        let events: HashSet<_> = events.iter().copied().collect();
        assert_eq!(events, HashSet::from([BASELINE_CAPACITY, CAPACITY_OUTCOME]));
    }
}

#[tokio::test]
async fn test_failing_patient_is_left_out() {
    let mut resources = patients(5);
    resources[2] = patient("3", "not-a-date");
    let server = InMemoryServer::default()
        .with_resources("Patient", resources, 2)
        .with_resources("Encounter", encounters_for(5), 5);
    let registry = Arc::new(RecordingRegistry::default());
    let events = Arc::new(CollectingEventSink::new());

    let summary = coordinator(server, registry.clone(), false)
        .with_event_sink(events.clone())
        .execute_export()
        .await
        .unwrap();

    assert_eq!(summary.successful, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.records_uploaded, 8);
    assert!(!summary.is_successful());
    assert_eq!(summary.failures[0].patient.as_str(), "Patient/3");

    let uploaded = registry.records.lock().unwrap();
    assert!(uploaded.iter().all(|r| r.subject_id() != Some("CAP-3")));
    assert!(events.events().iter().any(|e| matches!(
        e,
        PipelineEvent::MappingFailed { patient, .. } if patient.as_str() == "Patient/3"
    )));
}

#[tokio::test]
async fn test_unreadable_patient_is_skipped_and_reported() {
    let mut resources = patients(4);
    resources[1] = json!({"resourceType": "Patient", "id": "2", "birthDate": 19900102});
    let server = InMemoryServer::default()
        .with_resources("Patient", resources, 2)
        .with_resources("Encounter", encounters_for(4), 4);
    let registry = Arc::new(RecordingRegistry::default());
    let events = Arc::new(CollectingEventSink::new());

    let summary = coordinator(server, registry.clone(), false)
        .with_event_sink(events.clone())
        .execute_export()
        .await
        .unwrap();

    assert_eq!(summary.total_patients, 3);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.invalid_patients, 1);
    assert_eq!(summary.invalid_encounters, 0);
    assert_eq!(summary.records_uploaded, 6);
    assert!(!summary.is_successful());
    assert_eq!(summary.orphan_encounters, 1);

    assert!(events.events().iter().any(|e| matches!(
        e,
        PipelineEvent::InvalidResource { resource_type: "Patient", id, .. }
            if id.as_deref() == Some("2")
    )));
}

#[tokio::test]
async fn test_prepare_does_not_write_to_registry() {
    let server = InMemoryServer::default()
        .with_resources("Patient", patients(3), 2)
        .with_resources("Encounter", encounters_for(3), 2);
    let registry = Arc::new(RecordingRegistry::default());
    let coordinator = coordinator(server, registry.clone(), false);

    let prepared = coordinator.prepare().await.unwrap();
    assert_eq!(prepared.record_count(), 6);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);

    let summary = coordinator.upload(prepared).await.unwrap();
    assert_eq!(summary.records_uploaded, 6);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_orphan_encounters_are_dropped() {
    let mut encounters = encounters_for(2);
    encounters.push(encounter("stray", "Patient/999"));
    let server = InMemoryServer::default()
        .with_resources("Patient", patients(2), 10)
        .with_resources("Encounter", encounters, 10);
    let registry = Arc::new(RecordingRegistry::default());
    let events = Arc::new(CollectingEventSink::new());

    let summary = coordinator(server, registry.clone(), false)
        .with_event_sink(events.clone())
        .execute_export()
        .await
        .unwrap();

    assert_eq!(summary.orphan_encounters, 1);
    assert_eq!(summary.successful, 2);
    assert_eq!(events.orphan_count(), 1);
    assert_eq!(registry.records.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_patient_without_encounter_has_no_outcome_date() {
    let server = InMemoryServer::default().with_resources("Patient", patients(1), 10);
    let registry = Arc::new(RecordingRegistry::default());

    coordinator(server, registry.clone(), false)
        .execute_export()
        .await
        .unwrap();

    let records = registry.records.lock().unwrap();
    let outcome = records
        .iter()
        .find(|r| r.get(REDCAP_EVENT_NAME) == Some(&json!(CAPACITY_OUTCOME)))
        .unwrap();
    assert_eq!(outcome.get("capdis_outcomedate"), Some(&Value::Null));
}

#[tokio::test]
async fn test_dry_run_does_not_upload() {
    let server = InMemoryServer::default()
        .with_resources("Patient", patients(5), 2)
        .with_resources("Encounter", encounters_for(5), 2);
    let registry = Arc::new(RecordingRegistry::default());

    let summary = coordinator(server, registry.clone(), true)
        .execute_export()
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.records_produced, 10);
    assert_eq!(summary.records_uploaded, 0);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_server_skips_upload() {
    let registry = Arc::new(RecordingRegistry::default());

    let summary = coordinator(InMemoryServer::default(), registry.clone(), false)
        .execute_export()
        .await
        .unwrap();

    assert_eq!(summary.total_patients, 0);
    assert!(summary.is_successful());
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_page_failure_aborts_before_upload() {
    let server = InMemoryServer::default()
        .with_resources("Patient", patients(4), 2)
        .with_resources("Encounter", encounters_for(4), 2)
        .failing_at(&page_url("Encounter", 1));
    let registry = Arc::new(RecordingRegistry::default());

    let err = coordinator(server, registry.clone(), false)
        .execute_export()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CapacityError::Fhir(FhirError::PageRetrieval { .. })
    ));
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_upload_aborts_export() {
    let server = InMemoryServer::default().with_resources("Patient", patients(2), 10);
    let registry = Arc::new(RecordingRegistry {
        reject: true,
        ..Default::default()
    });

    let err = coordinator(server, registry, false)
        .execute_export()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CapacityError::Registry(RegistryError::ImportRejected { .. })
    ));
}

#[tokio::test]
async fn test_export_over_http() {
    let mut fhir = mockito::Server::new_async().await;
    let mut redcap = mockito::Server::new_async().await;

    fhir.mock("GET", "/Patient")
        .with_status(200)
        .with_body(serde_json::to_string(&Bundle::searchset(patients(2), None)).unwrap())
        .create_async()
        .await;
    fhir.mock("GET", "/Encounter")
        .with_status(200)
        .with_body(serde_json::to_string(&Bundle::searchset(encounters_for(2), None)).unwrap())
        .create_async()
        .await;
    let import = redcap
        .mock("POST", "/api/")
        .with_status(200)
        .with_body(r#"{"count": 4}"#)
        .expect(1)
        .create_async()
        .await;

    let config = parse_config(&format!(
        r#"
[fhir]
base_url = "{}"

[registry]
api_url = "{}/api/"
token = "0123456789ABCDEF"
"#,
        fhir.url(),
        redcap.url()
    ))
    .unwrap();

    let summary = ExportCoordinator::new(config)
        .unwrap()
        .execute_export()
        .await
        .unwrap();

    import.assert_async().await;
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.records_uploaded, 4);
}

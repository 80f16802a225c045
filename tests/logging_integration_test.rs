//! Integration tests for logging functionality
//!
//! The global subscriber can only be installed once per test binary, so a
//! single test covers initialization end to end.

use capacity_mapping::adapters::fhir::FhirClient;
use capacity_mapping::config::{FhirConfig, LoggingConfig};
use capacity_mapping::core::events::{EventSink, PipelineEvent, TracingEventSink};
use capacity_mapping::domain::PatientKey;
use capacity_mapping::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_invalid_level_is_rejected_before_setup() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("never-created");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "daily".to_string(),
    };

    assert!(init_logging("verbose", &config).is_err());
    assert!(!log_path.exists());
}

#[test]
fn test_file_logging_writes_json_lines() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    let guard = init_logging("debug", &config).unwrap();
    assert!(log_path.is_dir());

    // Only the crate's own targets pass the default filter
    FhirClient::new(FhirConfig {
        tls_verify: false,
        ..Default::default()
    })
    .unwrap();
    TracingEventSink.emit(PipelineEvent::MappingFailed {
        patient: PatientKey::for_patient_id("7").unwrap(),
        reason: "Missing required field: birthDate".to_string(),
    });

    // Dropping the guard flushes the non-blocking writer
    drop(guard);

    let contents = std::fs::read_to_string(log_path.join("capacity-mapping.log")).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert!(lines.iter().any(|l| {
        l["level"] == "WARN"
            && l["fields"]["message"] == "TLS certificate verification disabled for FHIR server"
    }));
    assert!(lines.iter().any(|l| {
        l["level"] == "ERROR"
            && l["fields"]["message"] == "Skipping patient that could not be mapped"
            && l["fields"]["patient"] == "Patient/7"
    }));
}

//! Domain error types
//!
//! This module defines the error hierarchy for the CAPACITY mapping pipeline.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CapacityError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// FHIR server errors (query and pagination)
    #[error("FHIR error: {0}")]
    Fhir(#[from] FhirError),

    /// REDCap registry errors (upload)
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Per-patient mapping errors
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Codebook encoding errors
    #[error("Codebook error: {0}")]
    Codebook(#[from] CodebookError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// FHIR-specific errors
///
/// Errors that occur when searching a FHIR server or following its
/// pagination links. These errors don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum FhirError {
    /// Failed to connect to the FHIR server
    #[error("Failed to connect to FHIR server: {0}")]
    ConnectionFailed(String),

    /// A `next` link was present but the page could not be retrieved
    #[error("Failed to retrieve page {url}: {reason}")]
    PageRetrieval { url: String, reason: String },

    /// Search failed
    #[error("Search failed: {0}")]
    QueryFailed(String),

    /// Invalid response from server
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// REDCap registry errors
///
/// Any of these aborts the run; no partial-import recovery is attempted.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to the REDCap API
    #[error("Failed to connect to registry: {0}")]
    ConnectionFailed(String),

    /// The registry rejected the import
    #[error("Import rejected: {status} - {message}")]
    ImportRejected { status: u16, message: String },

    /// Invalid response from the registry
    #[error("Invalid response from registry: {0}")]
    InvalidResponse(String),
}

/// Per-patient transformation errors
///
/// Raised by the record mapper. The batch processor catches these, records
/// the failing patient and continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// A field needed for the mapping is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A categorical value is not part of the codebook
    #[error("Unknown {field} category: {value}")]
    UnknownCategory { field: &'static str, value: String },

    /// A date could not be parsed as a calendar date
    #[error("Invalid date in {field}: {value}")]
    InvalidDate { field: &'static str, value: String },

    /// The admission start lies before the birth date
    #[error("Admission date {admission} precedes birth date {birth}")]
    AdmissionBeforeBirth { admission: String, birth: String },

    /// Encoding the mapped record failed
    #[error(transparent)]
    Codebook(#[from] CodebookError),
}

/// Codebook encoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodebookError {
    /// Value has no entry in the field's mapping table
    #[error("No mapping for value '{value}' in codebook field '{field}'")]
    UnmappedValue { field: &'static str, value: String },
}

// Conversion from std::io::Error
impl From<std::io::Error> for CapacityError {
    fn from(err: std::io::Error) -> Self {
        CapacityError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CapacityError {
    fn from(err: serde_json::Error) -> Self {
        CapacityError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CapacityError {
    fn from(err: toml::de::Error) -> Self {
        CapacityError::Configuration(format!("TOML parse error: {err}"))
    }
}

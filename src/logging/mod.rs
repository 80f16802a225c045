//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Human-readable console output
//! - JSON-formatted rolling log files
//! - Configurable log levels
//!
//! # Example
//!
//! ```no_run
//! use capacity_mapping::logging::init_logging;
//! use capacity_mapping::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log a patient that could not be mapped and was skipped
///
/// # Example
///
/// ```no_run
/// use capacity_mapping::log_patient_skipped;
/// use capacity_mapping::domain::MappingError;
///
/// let error = MappingError::MissingField("birthDate");
/// log_patient_skipped!("Patient/7", &error);
/// ```
#[macro_export]
macro_rules! log_patient_skipped {
    ($patient:expr, $error:expr) => {
        tracing::error!(
            patient = %$patient,
            error = %$error,
            "Skipping patient that could not be mapped"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use capacity_mapping::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}

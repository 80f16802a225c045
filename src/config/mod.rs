//! Configuration management for the CAPACITY mapping pipeline.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Configuration files support:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - Default values for optional settings
//! - `CAPACITY_<SECTION>_<KEY>` environment overrides
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use capacity_mapping::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("capacity.toml")?;
//!
//! println!("FHIR server: {}", config.fhir.base_url);
//! println!("Registry: {}", config.registry.api_url);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run switch
//! - [`FhirConfig`] - FHIR server connection, authentication and paging
//! - [`RegistryConfig`] - REDCap API endpoint and token
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [fhir]
//! base_url = "https://fhir.example.org/baseR4"
//! auth_type = "bearer"
//! token = "${CAPACITY_FHIR_TOKEN}"
//! page_size = 100
//!
//! [registry]
//! api_url = "https://redcap.example.org/api/"
//! token = "${CAPACITY_REDCAP_TOKEN}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, CapacityConfig, FhirConfig, LoggingConfig, RegistryConfig, RetryConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};

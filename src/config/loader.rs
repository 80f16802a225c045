//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::CapacityConfig;
use super::secret::secret_string;
use crate::domain::errors::CapacityError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CapacityConfig
/// 4. Applies environment variable overrides (CAPACITY_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - Configuration validation fails
pub fn load_config(path: impl AsRef<Path>) -> Result<CapacityConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CapacityError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CapacityError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses, overrides and validates configuration from TOML text
///
/// # Errors
///
/// Same as [`load_config`], minus the file access errors.
pub fn parse_config(contents: &str) -> Result<CapacityConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CapacityConfig = toml::from_str(&contents)
        .map_err(|e| CapacityError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        CapacityError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CapacityError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&cap[0], &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(CapacityError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the CAPACITY_* prefix
///
/// Environment variables follow the pattern: CAPACITY_<SECTION>_<KEY>
/// For example: CAPACITY_FHIR_BASE_URL, CAPACITY_REGISTRY_TOKEN
fn apply_env_overrides(config: &mut CapacityConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("CAPACITY_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("CAPACITY_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // FHIR overrides
    if let Ok(val) = std::env::var("CAPACITY_FHIR_BASE_URL") {
        config.fhir.base_url = val;
    }
    if let Ok(val) = std::env::var("CAPACITY_FHIR_AUTH_TYPE") {
        config.fhir.auth_type = val;
    }
    if let Ok(val) = std::env::var("CAPACITY_FHIR_USERNAME") {
        config.fhir.username = Some(val);
    }
    if let Ok(val) = std::env::var("CAPACITY_FHIR_PASSWORD") {
        config.fhir.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("CAPACITY_FHIR_TOKEN") {
        config.fhir.token = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("CAPACITY_FHIR_TLS_VERIFY") {
        config.fhir.tls_verify = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("CAPACITY_FHIR_PAGE_SIZE") {
        if let Ok(size) = val.parse() {
            config.fhir.page_size = Some(size);
        }
    }

    // Registry overrides
    if let Ok(val) = std::env::var("CAPACITY_REGISTRY_API_URL") {
        config.registry.api_url = val;
    }
    if let Ok(val) = std::env::var("CAPACITY_REGISTRY_TOKEN") {
        config.registry.token = secret_string(val);
    }
    if let Ok(val) = std::env::var("CAPACITY_REGISTRY_OVERWRITE_BEHAVIOR") {
        config.registry.overwrite_behavior = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("CAPACITY_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("CAPACITY_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

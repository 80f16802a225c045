//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "capacity.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing CAPACITY mapping configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, Self::generate_config()) {
            Ok(()) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your FHIR server and REDCap URLs", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - Set CAPACITY_REDCAP_TOKEN to your REDCap API token");
                println!("     - Set CAPACITY_FHIR_TOKEN if the FHIR server needs a bearer token");
                println!("  3. Validate configuration: capacity-mapping validate-config");
                println!("  4. Try a dry run: capacity-mapping export --dry-run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    /// Sample configuration with every section and its defaults
    fn generate_config() -> &'static str {
        r#"# CAPACITY Mapping Configuration File
# FHIR to CAPACITY REDCap ETL Tool

[application]
# Log level: trace, debug, info, warn, error
log_level = "info"

# Map all patients without uploading to REDCap
dry_run = false

[fhir]
# Base URL of the FHIR server (R4)
base_url = "http://localhost:8080/fhir"

# Authentication: none, basic or bearer
auth_type = "none"
# username = "fhir-user"
# password = "${CAPACITY_FHIR_PASSWORD}"
# token = "${CAPACITY_FHIR_TOKEN}"

tls_verify = true
timeout_seconds = 60

# Requested page size (_count), 1-1000. Omit to use the server default.
# page_size = 100

[fhir.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

[registry]
# REDCap API endpoint of the CAPACITY project
api_url = "http://localhost/redcap/api/"
token = "${CAPACITY_REDCAP_TOKEN}"

# normal keeps existing values for blank fields, overwrite blanks them
overwrite_behavior = "normal"

tls_verify = true
timeout_seconds = 300

[logging]
# JSON log files next to the console output
local_enabled = false
local_path = "/var/log/capacity-mapping"
# daily, hourly or never
local_rotation = "daily"
"#
    }
}

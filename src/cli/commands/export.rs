//! Export command implementation
//!
//! This module implements the `export` command: FHIR patients and encounters
//! are mapped to CAPACITY records and imported into REDCap.

use crate::config::load_config;
use crate::core::export::{ExportCoordinator, ExportSummary};
use clap::Args;

/// Maximum number of failed patients listed in the summary
const MAX_LISTED_FAILURES: usize = 10;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run mode - map all patients without uploading to REDCap
    #[arg(long)]
    pub dry_run: bool,

    /// Override the FHIR base URL
    #[arg(long)]
    pub fhir_url: Option<String>,

    /// Override the REDCap API URL
    #[arg(long)]
    pub registry_url: Option<String>,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };

        // Apply CLI overrides
        if let Some(url) = &self.fhir_url {
            tracing::info!(fhir_url = %url, "Overriding FHIR base URL from CLI");
            config.fhir.base_url = url.clone();
        }

        if let Some(url) = &self.registry_url {
            tracing::info!(registry_url = %url, "Overriding REDCap API URL from CLI");
            config.registry.api_url = url.clone();
        }

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let dry_run = config.application.dry_run;
        if dry_run {
            println!("🔍 DRY RUN MODE - No records will be uploaded to REDCap");
            println!();
        }

        // Confirmation prompt (unless --yes or dry-run)
        if !self.yes && !dry_run {
            println!("Export Configuration:");
            println!("  FHIR server: {}", config.fhir.base_url);
            println!("  REDCap API: {}", config.registry.api_url);
            println!("  Overwrite behavior: {}", config.registry.overwrite_behavior);
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        let coordinator = match ExportCoordinator::new(config) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export coordinator");
                eprintln!("Failed to initialize export: {e}");
                return Ok(4);
            }
        };

        println!("🚀 Starting export...");
        println!();

        // Ctrl-C is only honoured while reading and mapping. Once the import
        // request is sent it runs to completion.
        let prepared = tokio::select! {
            result = coordinator.prepare() => match result {
                Ok(p) => p,
                Err(e) => {
                    tracing::error!(error = %e, "Export failed");
                    eprintln!("Export failed: {e}");
                    return Ok(5);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT (Ctrl+C), export aborted");
                println!();
                println!("⚠️  Export interrupted. No records were uploaded.");
                return Ok(130);
            }
        };

        if !dry_run && prepared.record_count() > 0 {
            println!("📤 Uploading {} records...", prepared.record_count());
        }

        let summary = match coordinator.upload(prepared).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                eprintln!("Export failed: {e}");
                return Ok(5);
            }
        };

        print_summary(&summary);

        let exit_code = if summary.is_successful() {
            println!("✅ Export completed successfully!");
            0
        } else {
            println!("⚠️  Export completed with failures");
            1
        };

        Ok(exit_code)
    }
}

fn print_summary(summary: &ExportSummary) {
    println!();
    println!("📊 Export Summary:");
    println!("  Total Patients: {}", summary.total_patients);
    println!("  Successful: {}", summary.successful);
    println!("  Failed: {}", summary.failed);
    println!("  Records Produced: {}", summary.records_produced);
    if summary.dry_run {
        println!("  Records Uploaded: skipped (dry run)");
    } else {
        println!("  Records Uploaded: {}", summary.records_uploaded);
    }
    println!("  Orphan Encounters: {}", summary.orphan_encounters);
    if summary.invalid_patients + summary.invalid_encounters > 0 {
        println!(
            "  Unreadable Entries: {} patients, {} encounters",
            summary.invalid_patients, summary.invalid_encounters
        );
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", summary.success_rate());
    println!();

    if !summary.failures.is_empty() {
        println!("⚠️  Patients that could not be mapped:");
        for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
            println!("  - {}: {}", failure.patient, failure.reason);
        }
        if summary.failures.len() > MAX_LISTED_FAILURES {
            println!(
                "  ... and {} more",
                summary.failures.len() - MAX_LISTED_FAILURES
            );
        }
        println!();
    }
}

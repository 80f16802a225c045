//! CLI interface and argument parsing
//!
//! This module provides the command-line interface using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// capacity-mapping - FHIR to CAPACITY REDCap ETL
#[derive(Parser, Debug)]
#[command(name = "capacity-mapping")]
#[command(version, about, long_about = None)]
#[command(author = "CAPACITY Mapping Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "capacity.toml", env = "CAPACITY_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CAPACITY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Map all FHIR patients to CAPACITY records and upload them to REDCap
    Export(commands::export::ExportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Fill a test FHIR server with random patients and encounters
    Seed(commands::seed::SeedArgs),
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn parse_positive_usize(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(value)
}

#[derive(Parser, Debug)]
#[command(
    name = "task-scanner",
    about = "Task scanner - claims matching records and runs an action once per record",
    after_help = "Examples:\n  \
    task-scanner run --config scan.yaml --store records.json\n  \
    task-scanner run --config scan.yaml --store records.json --workers 8 --write-back"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one scan over the record store
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
}

#[derive(Parser, Debug, Clone)]
pub struct RunCmd {
    /// Path to the versioned YAML scan file
    #[arg(env = "TASK_SCANNER_CONFIG", long = "config", short = 'c')]
    pub config_file: PathBuf,

    /// JSON file holding the records, keyed by collection then record id
    #[arg(env = "TASK_SCANNER_STORE", long = "store", short = 's')]
    pub store_file: PathBuf,

    /// Persist the claim and completion markers back to the store file once the run ends
    #[arg(env = "TASK_SCANNER_WRITE_BACK", long, default_value_t = false)]
    pub write_back: bool,

    /// Overrides the worker count of the scan file
    #[arg(env = "TASK_SCANNER_WORKERS", long, value_parser = parse_positive_usize)]
    pub workers: Option<usize>,

    /// Overrides the record cap of the scan file
    #[arg(env = "TASK_SCANNER_MAX_RECORDS", long)]
    pub max_records: Option<usize>,
}

use clap::Parser as _;
use dotenvy::dotenv;
use std::sync::Arc;
use task_scanner::cli::{Cli, Commands, RunCmd};
use task_scanner::config::load_scan_file;
use task_scanner::core::client::action::ActionRegistry;
use task_scanner::core::client::store::InMemoryRecordStore;
use task_scanner::core::clock::SystemClock;
use task_scanner::utils::logging::init_logging;
use task_scanner::worker::ScanService;
use task_scanner::{ScannerError, ScannerResult};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { run_command } => {
            info!("Executing run command with args: {:?}", run_command);
            if let Err(e) = run_scanner(run_command).await {
                error!(
                    error = %e,
                    error_chain = ?e,
                    "Task scanner run failed"
                );
                std::process::exit(1);
            }
        }
    }
}

async fn run_scanner(run_cmd: &RunCmd) -> ScannerResult<()> {
    let mut scan_file = load_scan_file(&run_cmd.config_file)?;
    if let Some(workers) = run_cmd.workers {
        scan_file.scan.workers = workers;
    }
    if let Some(max_records) = run_cmd.max_records {
        scan_file.scan.max_records = Some(max_records);
    }
    debug!("Configuration loaded");

    let store = Arc::new(
        InMemoryRecordStore::load_from_file(&run_cmd.store_file)
            .await
            .map_err(|e| ScannerError::StoreFileError(format!("{}: {}", run_cmd.store_file.display(), e)))?,
    );

    let mut actions = ActionRegistry::new();
    if let Some(action) = &scan_file.action {
        actions.register(Arc::new(action.to_command_action()?));
    }

    let service = Arc::new(ScanService::new(store.clone(), actions, Arc::new(SystemClock)));
    let signal_service = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received ctrl+c");
            signal_service.shutdown();
        }
    });

    let job_id = service.start_task(scan_file.scan).await?;
    // Background runs return before the job ends
    service.job(&job_id).await?.wait_finished().await;

    let statistics = service.get_statistics(&job_id).await?;
    info!(job_id = %job_id, statistics = %serde_json::to_string(&statistics)?, "Task scanner run finished");

    if run_cmd.write_back {
        store
            .save_to_file(&run_cmd.store_file)
            .await
            .map_err(|e| ScannerError::StoreFileError(format!("{}: {}", run_cmd.store_file.display(), e)))?;
        info!(path = %run_cmd.store_file.display(), "Record store written back");
    }
    Ok(())
}

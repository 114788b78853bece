use super::ProjectSession;
use crate::cli_args::GenerateArgs;
use crate::output;
use anyhow::{Context, Result};
use colored::Colorize;
use log;
use xsnapshot_core::{AppError, PipelineCoordinator, PipelineEvent};

pub fn handle_generate_command(args: GenerateArgs, quiet: bool) -> Result<()> {
    let session = ProjectSession::open(&args.project_config, Some(&args.filters), None)?
        .with_save_dir(&args.save);
    let output_path = if args.stdout {
        None
    } else {
        session.output_path(&args.save)
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let document = runtime.block_on(async {
        let file_set = session.gather()?;
        let mut coordinator = PipelineCoordinator::new(session.settings.clone());
        coordinator.load_file_set(file_set);
        report_status(coordinator.load_summary(), quiet);
        run_to_snapshot(&mut coordinator, quiet).await
    })?;

    match document {
        Some(document) => output::print_snapshot_or_save(&document, output_path.as_deref(), quiet),
        None => {
            if !quiet {
                eprintln!(
                    "{}",
                    "No files to process after filtering. Nothing was written.".yellow()
                );
            }
            Ok(())
        }
    }
}

/// Drives a freshly loaded coordinator through filtering and generation.
/// Returns `None` when filtering leaves nothing to assemble.
pub async fn run_to_snapshot(
    coordinator: &mut PipelineCoordinator,
    quiet: bool,
) -> Result<Option<String>> {
    loop {
        let Some(event) = coordinator.next_update().await else {
            anyhow::bail!(AppError::Stage(
                "Pipeline went idle before producing a snapshot".to_string()
            ));
        };
        match event {
            PipelineEvent::Status(message) => report_status(&message, quiet),
            PipelineEvent::Filtered { included } => {
                log::info!("{} files survived filtering", included);
                report_status(coordinator.status(), quiet);
                if !coordinator.request_snapshot() {
                    return Ok(None);
                }
            }
            PipelineEvent::SnapshotReady => {
                report_status(coordinator.status(), quiet);
                return Ok(coordinator.take_snapshot());
            }
            PipelineEvent::FilterFailed(message) | PipelineEvent::SnapshotFailed(message) => {
                anyhow::bail!(AppError::Stage(message));
            }
        }
    }
}

/// Status lines go to stderr so a snapshot on stdout stays clean.
pub fn report_status(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message.dimmed());
    }
}

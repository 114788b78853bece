use super::ProjectSession;
use crate::cli_args::FilesArgs;
use crate::output::{self, print_data_or_text, print_files_table};
use anyhow::{Context, Result};
use colored::*;
use log;
use serde::Serialize;
use xsnapshot_core::{FilteredFileDescriptor, PatternCache, build_project_tree, filter_files};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesReport {
    pub project_name: String,
    pub total_files: usize,
    pub total_bytes: u64,
    pub total_bytes_readable: String,
    pub files: Vec<FilteredFileDescriptor>,
}

pub fn handle_files_command(args: FilesArgs, quiet: bool) -> Result<()> {
    let session = ProjectSession::open(&args.project_config, Some(&args.filters), None)?;
    let file_set = session.gather()?;

    log::debug!("Filtering {} gathered files...", file_set.files.len());
    let files = filter_files(
        &file_set.files,
        &file_set.rule_sets,
        &file_set.project_name,
        &session.settings.policy,
        &PatternCache::new(),
    )
    .context("Failed to apply ignore rules")?;

    let total_bytes: u64 = files.iter().map(|f| f.size).sum();
    let report = FilesReport {
        project_name: file_set.project_name,
        total_files: files.len(),
        total_bytes,
        total_bytes_readable: output::readable_size(total_bytes),
        files,
    };

    print_data_or_text(&report, &args.format_output, || {
        if report.files.is_empty() {
            if !quiet {
                println!("{}", "(No files survive filtering)".yellow());
            }
            return Ok(());
        }
        if args.tree {
            output::write_to_stdout(&build_project_tree(&report.files, &report.project_name))?;
        } else {
            print_files_table(&report.files);
        }
        if !quiet {
            println!(
                "{:<14} {}",
                "Total Files:".green(),
                report.total_files.to_string().cyan()
            );
            println!(
                "{:<14} {}",
                "Total Size:".green(),
                report.total_bytes_readable.cyan()
            );
        }
        Ok(())
    })
}

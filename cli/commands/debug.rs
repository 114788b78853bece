use super::ProjectSession;
use crate::cli_args::DebugArgs;
use crate::output::print_data_or_text;
use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use log;
use serde::Serialize;
use toml;
use xsnapshot_core::{Config, FileVerdict, PatternCache, RuleCascadeIndex, explain_files};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugInfo<'a> {
    effective_config: &'a Config,
    project_root: String,
    project_name: &'a str,
    rule_sets: Vec<RuleSetInfo>,
    included_count: usize,
    excluded_files: Vec<ExcludedFile>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuleSetInfo {
    directory_key: String,
    origin: String,
    patterns: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExcludedFile {
    path: String,
    verdict: FileVerdict,
}

pub fn handle_debug_command(args: DebugArgs, quiet: bool) -> Result<()> {
    let session = ProjectSession::open(&args.project_config, Some(&args.filters), None)?;
    let file_set = session.gather()?;
    let policy = &session.settings.policy;
    let cache = PatternCache::new();

    log::debug!("Debug: Building rule cascade...");
    let index = RuleCascadeIndex::build(
        &file_set.rule_sets,
        &file_set.project_name,
        &policy.rule_file_name,
        &cache,
    )
    .context("Failed to compile ignore rules")?;
    let rule_sets = index
        .keys()
        .into_iter()
        .filter_map(|key| {
            index.get(key).map(|set| RuleSetInfo {
                directory_key: key.to_string(),
                origin: set.origin().to_string(),
                patterns: set
                    .patterns()
                    .iter()
                    .map(|p| p.source().to_string())
                    .collect(),
            })
        })
        .collect();

    log::debug!("Debug: Classifying {} files...", file_set.files.len());
    let verdicts = explain_files(
        &file_set.files,
        &file_set.rule_sets,
        &file_set.project_name,
        policy,
        &cache,
    )
    .context("Failed to classify files")?;
    let included_count = verdicts.iter().filter(|(_, v)| v.is_included()).count();
    let excluded_files = verdicts
        .into_iter()
        .filter(|(_, verdict)| !verdict.is_included())
        .map(|(file, verdict)| ExcludedFile {
            path: file.relative_path,
            verdict,
        })
        .collect();

    let debug_data = DebugInfo {
        effective_config: &session.config,
        project_root: session.project_root.display().to_string(),
        project_name: &session.project_name,
        rule_sets,
        included_count,
        excluded_files,
    };

    print_data_or_text(&debug_data, &args.format_output, || {
        print_debug_info_pretty(&debug_data, quiet)
    })
}

fn print_debug_info_pretty(debug_info: &DebugInfo, quiet: bool) -> Result<()> {
    println!(
        "{}",
        "\n--- Effective Configuration ---"
            .green()
            .bold()
            .underline()
    );
    let config_toml = toml::to_string_pretty(debug_info.effective_config)
        .context("Failed to serialize effective config to TOML")?;
    println!("{}", config_toml);
    println!(
        "{:<14} {}\n{:<14} {}",
        "Project Root:".green(),
        debug_info.project_root.cyan(),
        "Project Name:".green(),
        debug_info.project_name.cyan()
    );

    println!("{}", "\n--- Rule Sets ---".green().bold().underline());
    if debug_info.rule_sets.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Directory").fg(Color::Green),
            Cell::new("Origin").fg(Color::Green),
            Cell::new("Patterns").fg(Color::Green),
        ]);
        for rule_set in &debug_info.rule_sets {
            table.add_row(vec![
                Cell::new(&rule_set.directory_key).fg(Color::Cyan),
                Cell::new(&rule_set.origin).fg(Color::DarkGrey),
                Cell::new(rule_set.patterns.len()).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }

    println!("{}", "\n--- Excluded Files ---".green().bold().underline());
    if debug_info.excluded_files.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        for excluded in &debug_info.excluded_files {
            println!(
                "  {} {}",
                excluded.path,
                format!("({})", excluded.verdict.describe()).dimmed()
            );
        }
    }

    if !quiet {
        println!(
            "\n{} {} included, {} excluded",
            "Summary:".green(),
            debug_info.included_count.to_string().cyan(),
            debug_info.excluded_files.len().to_string().yellow()
        );
    }
    Ok(())
}

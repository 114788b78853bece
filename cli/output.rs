use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use xsnapshot_core::FilteredFileDescriptor;

use crate::cli_args::FormatOutputOpts;

pub fn print_snapshot_or_save(document: &str, output_path: Option<&Path>, quiet: bool) -> Result<()> {
    match output_path {
        Some(path) => {
            write_to_file(path, document)?;
            if !quiet {
                println!(
                    "{} Snapshot saved to: {}",
                    "✅".green(),
                    path.display().to_string().blue()
                );
            }
        }
        None => write_to_stdout(document)?,
    }
    Ok(())
}

/// Prints `data` as JSON/YAML when a format was requested, otherwise runs `pretty`.
pub fn print_data_or_text<T, F>(data: &T, format_opts: &FormatOutputOpts, pretty: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> Result<()>,
{
    match format_opts.format.as_deref() {
        Some(format) => {
            let content = serialize_output(data, format, format_opts.disable_json_minify)?;
            write_to_stdout(&content)
        }
        None => pretty(),
    }
}

pub fn readable_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

pub fn print_files_table(files: &[FilteredFileDescriptor]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Path").fg(Color::Green),
        Cell::new("Size").fg(Color::Green),
    ]);
    for file in files {
        table.add_row(vec![
            Cell::new(&file.relative_path).fg(Color::Cyan),
            Cell::new(readable_size(file.size))
                .set_alignment(CellAlignment::Right)
                .fg(Color::DarkGrey),
        ]);
    }
    println!("{table}");
}

fn serialize_output<T: Serialize>(data: &T, format: &str, pretty_json: bool) -> Result<String> {
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yml::to_string(data).context("Failed to serialize output as YAML"),
        _ => {
            let content = if pretty_json {
                serde_json::to_string_pretty(data)
            } else {
                serde_json::to_string(data)
            };
            content.context("Failed to serialize output as JSON")
        }
    }
}

pub fn write_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("Failed to create file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to file {}", path.display()))?;
    Ok(())
}

pub fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Asks before replacing `path`. Quiet mode never overwrites.
pub fn confirm_overwrite(path: &Path, what: &str, quiet: bool) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    if quiet {
        anyhow::bail!(
            "Target file '{}' exists. Overwrite prevented in quiet mode.",
            path.display()
        );
    }
    print!(
        "{} {} already exists at '{}'. Overwrite? [{}/{}] ",
        "⚠️".yellow(),
        what,
        path.display().to_string().cyan(),
        "y".green(),
        "N".red()
    );
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut response = String::new();
    io::stdin()
        .read_line(&mut response)
        .context("Failed to read user input")?;
    if response.trim().eq_ignore_ascii_case("y") {
        Ok(true)
    } else {
        println!("Save cancelled.");
        Ok(false)
    }
}

mod cli_args;
mod commands;
mod output;
mod watch;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use log;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, FilterOverrides, ProjectConfigOpts};
use xsnapshot_core::{AppError, Config};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;
    let verbose = cli_args.verbose;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet, verbose) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = match e.downcast_ref::<AppError>() {
                Some(AppError::Config(_)) => 1,
                Some(AppError::TomlParse(_)) => 1,
                Some(AppError::TomlSerialize(_)) => 1,
                Some(AppError::DataLoading(_)) => 1,
                Some(AppError::Io(_)) => 2,
                Some(AppError::FileRead { .. }) => 2,
                Some(AppError::FileWrite { .. }) => 2,
                Some(AppError::DirCreation { .. }) => 2,
                Some(AppError::Walk(_)) => 2,
                Some(AppError::Pattern { .. }) => 3,
                Some(AppError::Stage(_)) => 4,
                Some(AppError::InvalidArgument(_)) => 5,
                Some(AppError::SizeParse(_)) => 5,
                Some(AppError::DurationParse(_)) => 5,
                Some(AppError::JsonSerialize(_)) => 6,
                Some(AppError::YamlError(_)) => 6,
                Some(_) => 1,
                None => 1,
            };

            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}\n", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool, verbose: u8) -> Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };
    match command {
        Commands::Completion(args) => {
            log::debug!("Executing 'completion' command...");
            commands::completion::handle_completion_command(&args, quiet)?;
        }
        Commands::Config(args) => {
            log::debug!("Executing 'config' command...");
            let project_root =
                Config::determine_project_root(args.project_config.project_root.as_ref())
                    .context("Failed to determine project root for config command")?;
            commands::config::handle_config_command(&args, &project_root, quiet)?;
        }
        Commands::Generate(args) => {
            log::debug!("Executing 'generate' command...");
            commands::generate::handle_generate_command(args, quiet)?;
        }
        Commands::Watch(args) => {
            log::debug!("Executing 'watch' command...");
            watch::run_watch_mode(args, quiet, verbose)?;
        }
        Commands::Files(args) => {
            log::debug!("Executing 'files' command...");
            commands::files::handle_files_command(args, quiet)?;
        }
        Commands::Debug(args) => {
            log::debug!("Executing 'debug' command...");
            commands::debug::handle_debug_command(args, quiet)?;
        }
    }
    Ok(())
}

fn apply_filter_overrides(mut config: Config, overrides: &FilterOverrides) -> Config {
    log::trace!("Applying filter CLI overrides to config...");
    if let Some(size) = &overrides.max_file_size {
        config.filter.max_file_size = size.clone();
    }
    if let Some(name) = &overrides.rule_file_name {
        config.filter.rule_file_name = name.clone();
    }
    if overrides.disable_builtin_ignore {
        config.filter.enable_builtin_ignore = false;
    }
    if overrides.enable_builtin_ignore {
        config.filter.enable_builtin_ignore = true;
    }
    config
}

/// Loads the config file (if any) and layers CLI overrides on top.
pub fn load_config_for_command(
    project_root: &Path,
    project_opts: &ProjectConfigOpts,
    filter_overrides: Option<&FilterOverrides>,
    watch_delay: Option<&String>,
) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        project_root,
        project_opts.context_file.as_ref(),
        project_opts.disable_context_file,
    )
    .context("Failed to resolve configuration path")?;

    let mut config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(name) = &project_opts.project_name {
        config.general.project_name = Some(name.clone());
    }
    if let Some(overrides) = filter_overrides {
        config = apply_filter_overrides(config, overrides);
    }
    if let Some(delay) = watch_delay {
        config.watch.delay = delay.clone();
    }

    config.general.project_name = Some(config.get_effective_project_name(project_root));
    log::trace!("Effective config: {:?}", config);
    Ok(config)
}

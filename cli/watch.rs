use crate::cli_args::WatchArgs;
use crate::commands::ProjectSession;
use crate::commands::generate::report_status;
use crate::output;
use anyhow::{Context, Result};
use colored::*;
use log;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use xsnapshot_core::{Config, PipelineCoordinator, PipelineEvent, rule_set_origin, to_slash_relative};

const WATCH_EVENT_BUFFER: usize = 16;

enum WatchSignal {
    Changes(Option<DebounceEventResult>),
    Pipeline(Option<PipelineEvent>),
    Shutdown(std::io::Result<()>),
}

/// How a batch of file system events affects the pipeline.
#[derive(Debug, PartialEq, Eq)]
enum ChangeKind {
    Unrelated,
    RuleEdits(Vec<(String, String)>),
    FileSet,
    Config,
}

pub fn run_watch_mode(watch_args: WatchArgs, quiet: bool, verbose: u8) -> Result<()> {
    let mut session = open_session(&watch_args)
        .context("Failed to load initial configuration for watch mode")?;

    if !quiet {
        println!(
            "👀 Starting watch mode for '{}'. Press Ctrl+C to exit.",
            session.project_root.display()
        );
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(watch_loop(&watch_args, &mut session, quiet, verbose))
}

async fn watch_loop(
    watch_args: &WatchArgs,
    session: &mut ProjectSession,
    quiet: bool,
    verbose: u8,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<DebounceEventResult>(WATCH_EVENT_BUFFER);
    let delay = session
        .config
        .get_watch_delay()
        .context("Invalid watch delay duration")?;
    let mut debouncer = new_debouncer(delay, move |result: DebounceEventResult| {
        if tx.blocking_send(result).is_err() {
            log::trace!("Watch loop gone, dropping debounced batch.");
        }
    })
    .map_err(|e| anyhow::anyhow!("Failed to create debouncer: {}", e))?;
    debouncer
        .watcher()
        .watch(&session.project_root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", session.project_root.display()))?;
    log::debug!(
        "Watching {} recursively (debounce {:?})",
        session.project_root.display(),
        delay
    );

    let mut coordinator = PipelineCoordinator::new(session.settings.clone());
    reload_file_set(&mut coordinator, session, quiet);

    loop {
        let signal = tokio::select! {
            batch = rx.recv() => WatchSignal::Changes(batch),
            event = coordinator.next_update(), if coordinator.is_busy() => WatchSignal::Pipeline(event),
            result = tokio::signal::ctrl_c() => WatchSignal::Shutdown(result),
        };

        match signal {
            WatchSignal::Shutdown(result) => {
                result.context("Failed to listen for Ctrl+C")?;
                if !quiet {
                    println!("\n{}", "Stopping watch mode.".dimmed());
                }
                return Ok(());
            }
            WatchSignal::Changes(None) => {
                eprintln!("{}", "⛔ Watcher channel closed.".red());
                return Ok(());
            }
            WatchSignal::Changes(Some(Err(error))) => {
                if !quiet {
                    eprintln!("{} {:#}\n", "⚠️ Watch error:".yellow(), error);
                }
                log::error!("Notify error received: {:?}", error);
            }
            WatchSignal::Changes(Some(Ok(events))) => {
                for event in &events {
                    log::trace!("Debounced event: {:?}", event);
                }
                let paths: Vec<PathBuf> = events.into_iter().map(|event| event.path).collect();
                let config_path = Config::resolve_config_path(
                    &session.project_root,
                    watch_args.project_config.context_file.as_ref(),
                    watch_args.project_config.disable_context_file,
                )
                .ok()
                .flatten();

                match classify_changes(session, &coordinator, config_path.as_deref(), &paths) {
                    ChangeKind::Unrelated => log::trace!("Ignoring {} unrelated path(s).", paths.len()),
                    ChangeKind::RuleEdits(edits) => {
                        if !quiet && verbose > 0 {
                            eprintln!("\n{} {} rule file(s) changed.", "🔄".blue(), edits.len());
                        }
                        for (origin, content) in edits {
                            coordinator.update_rule_set(&origin, content);
                        }
                        report_status(coordinator.status(), quiet);
                    }
                    ChangeKind::FileSet => {
                        if !quiet && verbose > 0 {
                            eprintln!("\n{} {}", "🔄".blue(), "Project files changed. Regathering...");
                        }
                        reload_file_set(&mut coordinator, session, quiet);
                    }
                    ChangeKind::Config => {
                        if !quiet && verbose > 0 {
                            eprintln!(
                                "{}",
                                "🔄 Config file changed. Reloading configuration...".blue()
                            );
                        }
                        match open_session(watch_args) {
                            Ok(reloaded) => {
                                *session = reloaded;
                                coordinator = PipelineCoordinator::new(session.settings.clone());
                                if !quiet && verbose > 0 {
                                    eprintln!("{}", "✅ Configuration reloaded.".green());
                                }
                                reload_file_set(&mut coordinator, session, quiet);
                            }
                            Err(e) => {
                                if !quiet {
                                    eprintln!("{} {:#}\n", "⚠️ Error reloading config:".yellow(), e);
                                }
                            }
                        }
                    }
                }
            }
            WatchSignal::Pipeline(None) => log::trace!("No live stage unit."),
            WatchSignal::Pipeline(Some(event)) => {
                handle_pipeline_event(&mut coordinator, session, watch_args, event, quiet, verbose)
            }
        }
    }
}

fn open_session(watch_args: &WatchArgs) -> Result<ProjectSession> {
    Ok(ProjectSession::open(
        &watch_args.project_config,
        Some(&watch_args.filters),
        watch_args.watch_delay.as_ref(),
    )?
    .with_save_dir(&watch_args.save))
}

fn reload_file_set(
    coordinator: &mut PipelineCoordinator,
    session: &ProjectSession,
    quiet: bool,
) {
    match session.gather() {
        Ok(file_set) => {
            coordinator.load_file_set(file_set);
            report_status(coordinator.load_summary(), quiet);
        }
        Err(e) => {
            if !quiet {
                eprintln!("{} {:#}\n", "⚠️ Error gathering project files:".yellow(), e);
            }
        }
    }
}

fn handle_pipeline_event(
    coordinator: &mut PipelineCoordinator,
    session: &ProjectSession,
    watch_args: &WatchArgs,
    event: PipelineEvent,
    quiet: bool,
    verbose: u8,
) {
    match event {
        PipelineEvent::Status(message) => report_status(&message, quiet),
        PipelineEvent::Filtered { .. } => {
            report_status(coordinator.status(), quiet);
            if !coordinator.request_snapshot() && !quiet {
                eprintln!("{}", coordinator.status().yellow());
            }
        }
        PipelineEvent::SnapshotReady => {
            let Some(document) = coordinator.take_snapshot() else {
                return;
            };
            let output_path = session.output_path(&watch_args.save);
            match output::print_snapshot_or_save(&document, output_path.as_deref(), quiet) {
                Ok(()) => {
                    if !quiet && verbose > 0 {
                        println!("{}\n", "✅ Regeneration complete.".green());
                    }
                }
                Err(e) => {
                    if !quiet {
                        eprintln!("{} {:#}\n", "⚠️ Error writing snapshot:".yellow(), e);
                    }
                }
            }
        }
        PipelineEvent::FilterFailed(message) | PipelineEvent::SnapshotFailed(message) => {
            if !quiet {
                eprintln!("{} {}\n", "⚠️".yellow(), message);
            }
            log::warn!("{}", message);
        }
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Rule file edits refilter in place; anything else that can change the file set regathers.
fn classify_changes(
    session: &ProjectSession,
    coordinator: &PipelineCoordinator,
    config_path: Option<&Path>,
    paths: &[PathBuf],
) -> ChangeKind {
    if let Some(config_path) = config_path {
        if paths.iter().any(|path| same_path(path, config_path)) {
            return ChangeKind::Config;
        }
    }

    let save_dir = session.save_dir();
    let prune_save_dir = save_dir != session.project_root;
    let snapshot_path = session.snapshot_path();
    let policy = &session.settings.policy;
    let mut edits = Vec::new();
    for path in paths {
        if (prune_save_dir && path.starts_with(&save_dir)) || *path == snapshot_path {
            continue;
        }
        let Some(relative) = to_slash_relative(&session.project_root, path) else {
            continue;
        };
        if relative.split('/').any(|segment| policy.is_ignored_directory(segment)) {
            continue;
        }

        let known_origin = rule_set_origin(
            &session.project_root,
            &session.project_name,
            &policy.rule_file_name,
            path,
        )
        .filter(|origin| coordinator.rule_sets().iter().any(|r| &r.origin == origin));
        let Some(origin) = known_origin else {
            return ChangeKind::FileSet;
        };
        match fs::read_to_string(path) {
            Ok(content) => edits.push((origin, content)),
            Err(e) => {
                log::debug!("Rule file {} unreadable ({}); regathering.", path.display(), e);
                return ChangeKind::FileSet;
            }
        }
    }

    if edits.is_empty() {
        ChangeKind::Unrelated
    } else {
        ChangeKind::RuleEdits(edits)
    }
}

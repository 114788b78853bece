//! Filter → assemble pipeline with at most one live unit per stage.
//!
//! The coordinator is the only thing that mutates pipeline state. Stage units
//! run as tokio tasks and talk back over their own bounded channel; replacing a
//! unit cancels its token, aborts its task and drops its receiver before the
//! successor is spawned, so nothing from a superseded run is ever applied.
//!
//! Methods that start a stage call `tokio::spawn` and must run inside a tokio
//! runtime.

pub mod stages;

use crate::filter::{FileDescriptor, FilterPolicy, FilteredFileDescriptor};
use crate::protocol::{
    FilterRequest, FilterResponse, SnapshotRequest, SnapshotResponse, filter_failure,
    snapshot_failure,
};
use crate::rules::{PatternCache, RuleSet};
use crate::snapshot::LanguageTable;
use log;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const STAGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    Idle,
    Analyzing,
    Filtering,
    Ready,
    Generating,
    Error,
}

/// Immutable configuration handed to every stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub policy: FilterPolicy,
    pub languages: LanguageTable,
}

/// A complete input: every file under the project plus the rule sets found with them.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    pub project_name: String,
    pub files: Vec<FileDescriptor>,
    pub rule_sets: Vec<RuleSet>,
}

/// What changed after applying one stage message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Status(String),
    Filtered { included: usize },
    FilterFailed(String),
    SnapshotReady,
    SnapshotFailed(String),
}

struct StageUnit<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl<T> StageUnit<T> {
    fn terminate(self) {
        self.cancel.cancel();
        self.handle.abort();
        drop(self.rx);
    }
}

enum Incoming {
    Filter(Option<FilterResponse>),
    Snapshot(Option<SnapshotResponse>),
}

pub struct PipelineCoordinator {
    settings: Arc<PipelineSettings>,
    cache: Arc<PatternCache>,
    phase: PipelinePhase,
    status: String,
    load_summary: String,
    project_name: String,
    files: Option<Arc<[FileDescriptor]>>,
    rule_sets: Vec<RuleSet>,
    filtered: Vec<FilteredFileDescriptor>,
    snapshot: Option<String>,
    filter_unit: Option<StageUnit<FilterResponse>>,
    snapshot_unit: Option<StageUnit<SnapshotResponse>>,
}

impl PipelineCoordinator {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            cache: Arc::new(PatternCache::new()),
            phase: PipelinePhase::Idle,
            status: String::new(),
            load_summary: String::new(),
            project_name: String::new(),
            files: None,
            rule_sets: Vec::new(),
            filtered: Vec::new(),
            snapshot: None,
            filter_unit: None,
            snapshot_unit: None,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Rule-file and file counts from the last `load_file_set`.
    pub fn load_summary(&self) -> &str {
        &self.load_summary
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    pub fn filtered_files(&self) -> &[FilteredFileDescriptor] {
        &self.filtered
    }

    pub fn snapshot(&self) -> Option<&str> {
        self.snapshot.as_deref()
    }

    pub fn take_snapshot(&mut self) -> Option<String> {
        self.snapshot.take()
    }

    pub fn is_busy(&self) -> bool {
        self.filter_unit.is_some() || self.snapshot_unit.is_some()
    }

    pub fn can_generate(&self) -> bool {
        self.phase == PipelinePhase::Ready && !self.filtered.is_empty()
    }

    /// Replaces the current input and restarts filtering.
    pub fn load_file_set(&mut self, file_set: FileSet) {
        self.terminate_units();
        self.filtered.clear();
        self.snapshot = None;
        self.set_phase(PipelinePhase::Analyzing);
        self.set_status("Analyzing folder structure...");

        let rule_file_name = &self.settings.policy.rule_file_name;
        let rule_file_count = file_set
            .rule_sets
            .iter()
            .filter(|rs| rs.origin.rsplit('/').next() == Some(rule_file_name.as_str()))
            .count();
        let rules_message = if rule_file_count > 0 {
            format!(
                "Loaded rules from {} {} file(s).",
                rule_file_count, rule_file_name
            )
        } else {
            format!("No {} found. Using default rules.", rule_file_name)
        };

        self.project_name = file_set.project_name;
        self.rule_sets = file_set.rule_sets;
        let files: Arc<[FileDescriptor]> = file_set.files.into();
        self.load_summary = format!("{} Found {} total files.", rules_message, files.len());
        self.set_status(self.load_summary.clone());
        self.files = Some(files);

        if self.project_name.is_empty() {
            log::warn!("File set has no project name; filtering not started");
            return;
        }
        self.start_filtering("Applying ignore rules in the background...");
    }

    /// Inserts or replaces the rule set with this origin.
    ///
    /// Filtering restarts only if a file set is loaded.
    pub fn update_rule_set(&mut self, origin: &str, content: impl Into<String>) {
        let content = content.into();
        match self.rule_sets.iter_mut().find(|rs| rs.origin == origin) {
            Some(existing) => existing.content = content,
            None => self.rule_sets.push(RuleSet::new(origin, content)),
        }

        if self.files.is_some() && !self.project_name.is_empty() {
            self.start_filtering("Updating ignore rules... Reapplying filters.");
        } else {
            log::debug!("Stored rule set '{}' with no file set loaded", origin);
        }
    }

    /// Starts generation over the current filtered list. Returns `false` when
    /// there is nothing to generate.
    pub fn request_snapshot(&mut self) -> bool {
        let Some(files) = self.files.as_ref().filter(|_| !self.filtered.is_empty()) else {
            self.set_status("No files to process after filtering.");
            return false;
        };

        let included: HashSet<&str> = self
            .filtered
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        let request = SnapshotRequest {
            files: files
                .iter()
                .filter(|f| included.contains(f.relative_path.as_str()))
                .cloned()
                .collect(),
            project_name: self.project_name.clone(),
        };

        if let Some(unit) = self.snapshot_unit.take() {
            log::debug!("Superseding in-flight snapshot generation");
            unit.terminate();
        }
        self.snapshot = None;
        self.set_phase(PipelinePhase::Generating);
        self.set_status("Starting snapshot generation in the background...");

        let (tx, rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(stages::run_snapshot_stage(
            request,
            Arc::clone(&self.settings),
            tx,
            cancel.clone(),
        ));
        self.snapshot_unit = Some(StageUnit { rx, cancel, handle });
        true
    }

    /// Drops everything, including any in-flight work, and returns to `Idle`.
    pub fn reset(&mut self) {
        self.terminate_units();
        self.phase = PipelinePhase::Idle;
        self.status.clear();
        self.load_summary.clear();
        self.project_name.clear();
        self.files = None;
        self.rule_sets.clear();
        self.filtered.clear();
        self.snapshot = None;
    }

    /// Waits for the next message from a live unit and applies it.
    ///
    /// Returns `None` immediately when no unit is running.
    pub async fn next_update(&mut self) -> Option<PipelineEvent> {
        if !self.is_busy() {
            return None;
        }
        let incoming = tokio::select! {
            message = recv_from(&mut self.filter_unit) => Incoming::Filter(message),
            message = recv_from(&mut self.snapshot_unit) => Incoming::Snapshot(message),
        };
        Some(match incoming {
            Incoming::Filter(message) => self.apply_filter_message(message),
            Incoming::Snapshot(message) => self.apply_snapshot_message(message),
        })
    }

    fn apply_filter_message(&mut self, message: Option<FilterResponse>) -> PipelineEvent {
        self.filter_unit = None;
        match message {
            Some(FilterResponse::FilterResult { filtered_files }) => {
                let included = filtered_files.len();
                self.filtered = filtered_files;
                self.snapshot = None;
                self.set_phase(PipelinePhase::Ready);
                self.set_status(format!(
                    "{} files will be included. Ready to generate snapshot.",
                    included
                ));
                PipelineEvent::Filtered { included }
            }
            Some(FilterResponse::FilterError { message }) => self.fail_filtering(message),
            None => self.fail_filtering(filter_failure("filter stage stopped unexpectedly")),
        }
    }

    fn fail_filtering(&mut self, message: String) -> PipelineEvent {
        self.filtered.clear();
        self.set_phase(PipelinePhase::Error);
        self.set_status(message.clone());
        PipelineEvent::FilterFailed(message)
    }

    fn apply_snapshot_message(&mut self, message: Option<SnapshotResponse>) -> PipelineEvent {
        match message {
            Some(SnapshotResponse::StatusUpdate { message }) => {
                self.set_status(message.clone());
                PipelineEvent::Status(message)
            }
            Some(SnapshotResponse::SnapshotResult { content }) => {
                self.snapshot_unit = None;
                self.snapshot = Some(content);
                self.set_phase(PipelinePhase::Ready);
                self.set_status(format!(
                    "Snapshot for \"{}\" created successfully!",
                    self.project_name
                ));
                PipelineEvent::SnapshotReady
            }
            Some(SnapshotResponse::SnapshotError { message }) => {
                self.snapshot_unit = None;
                self.fail_generation(message)
            }
            None => {
                self.snapshot_unit = None;
                self.fail_generation(snapshot_failure("snapshot stage stopped unexpectedly"))
            }
        }
    }

    fn fail_generation(&mut self, message: String) -> PipelineEvent {
        self.set_phase(PipelinePhase::Error);
        self.set_status(message.clone());
        PipelineEvent::SnapshotFailed(message)
    }

    fn start_filtering(&mut self, status: &str) {
        let Some(files) = self.files.as_ref().map(Arc::clone) else {
            return;
        };
        self.terminate_units();
        self.filtered.clear();
        self.snapshot = None;
        self.set_phase(PipelinePhase::Filtering);
        self.set_status(status);

        let request = FilterRequest {
            files,
            rule_sets: self.rule_sets.clone(),
            root_key: self.project_name.clone(),
        };
        let (tx, rx) = mpsc::channel(STAGE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(stages::run_filter_stage(
            request,
            Arc::clone(&self.settings),
            Arc::clone(&self.cache),
            tx,
            cancel.clone(),
        ));
        self.filter_unit = Some(StageUnit { rx, cancel, handle });
    }

    fn terminate_units(&mut self) {
        if let Some(unit) = self.filter_unit.take() {
            log::debug!("Terminating in-flight filter unit");
            unit.terminate();
        }
        if let Some(unit) = self.snapshot_unit.take() {
            log::debug!("Terminating in-flight snapshot unit");
            unit.terminate();
        }
    }

    fn set_phase(&mut self, phase: PipelinePhase) {
        if self.phase != phase {
            log::debug!("Pipeline phase {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        log::debug!("Status: {}", self.status);
    }
}

impl Drop for PipelineCoordinator {
    fn drop(&mut self) {
        self.terminate_units();
    }
}

/// Pending forever when the unit is absent, so `select!` only wakes on live units.
async fn recv_from<T>(unit: &mut Option<StageUnit<T>>) -> Option<T> {
    match unit {
        Some(unit) => unit.rx.recv().await,
        None => std::future::pending().await,
    }
}

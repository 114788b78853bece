//! Bodies of the two background stage units.
//!
//! A stage owns the sending half of its channel. Once its token is cancelled it
//! never sends again; the coordinator additionally drops the receiver, so a late
//! send simply fails.

use super::PipelineSettings;
use crate::filter::filter_files;
use crate::protocol::{
    FilterRequest, FilterResponse, SnapshotRequest, SnapshotResponse, StageRequest,
};
use crate::rules::PatternCache;
use crate::snapshot::assemble_snapshot;
use log;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub(crate) async fn run_filter_stage(
    request: FilterRequest,
    settings: Arc<PipelineSettings>,
    cache: Arc<PatternCache>,
    tx: mpsc::Sender<FilterResponse>,
    cancel: CancellationToken,
) {
    log::debug!(
        "Filter stage started: {} files, {} rule set(s)",
        request.files.len(),
        request.rule_sets.len()
    );
    trace_request(StageRequest::FilterFiles(&request));
    let token = cancel.clone();
    let work = tokio::task::spawn_blocking(move || {
        // A pass that has started runs to completion; only its result is dropped.
        if token.is_cancelled() {
            return Ok(None);
        }
        filter_files(
            &request.files,
            &request.rule_sets,
            &request.root_key,
            &settings.policy,
            &cache,
        )
        .map(Some)
    });

    let response = tokio::select! {
        _ = cancel.cancelled() => {
            log::debug!("Filter stage cancelled");
            return;
        }
        joined = work => match joined {
            Ok(Ok(Some(filtered_files))) => FilterResponse::FilterResult { filtered_files },
            Ok(Ok(None)) => {
                log::debug!("Filter stage cancelled before its pass");
                return;
            }
            Ok(Err(e)) => {
                log::error!("Filtering failed: {}", e);
                FilterResponse::error(e)
            }
            Err(e) => {
                log::error!("Filter task failed: {}", e);
                FilterResponse::error(e)
            }
        },
    };
    deliver(&tx, &cancel, response).await;
}

pub(crate) async fn run_snapshot_stage(
    request: SnapshotRequest,
    settings: Arc<PipelineSettings>,
    tx: mpsc::Sender<SnapshotResponse>,
    cancel: CancellationToken,
) {
    log::debug!(
        "Snapshot stage started: {} files for '{}'",
        request.files.len(),
        request.project_name
    );
    trace_request(StageRequest::GenerateSnapshot(&request));
    let outcome = tokio::select! {
        _ = cancel.cancelled() => None,
        outcome = assemble_snapshot(
            &request.files,
            &request.project_name,
            &settings.languages,
            &tx,
            &cancel,
        ) => Some(outcome),
    };

    let response = match outcome {
        Some(Ok(Some(content))) => SnapshotResponse::SnapshotResult { content },
        Some(Err(e)) => {
            log::error!("Snapshot generation failed: {}", e);
            SnapshotResponse::error(e)
        }
        Some(Ok(None)) | None => {
            log::debug!("Snapshot stage cancelled");
            return;
        }
    };
    deliver(&tx, &cancel, response).await;
}

fn trace_request(request: StageRequest<'_>) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }
    match serde_json::to_string(&request) {
        Ok(json) => log::trace!("Stage request: {}", json),
        Err(e) => log::trace!("Stage request could not be serialised: {}", e),
    }
}

async fn deliver<T>(tx: &mpsc::Sender<T>, cancel: &CancellationToken, message: T) {
    if cancel.is_cancelled() {
        return;
    }
    if tx.send(message).await.is_err() {
        log::debug!("Stage result dropped: receiver is gone");
    }
}

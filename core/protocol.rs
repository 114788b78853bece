//! Messages exchanged between the pipeline coordinator and its stage units.
//!
//! Every message serialises as a tagged record, `{"type": "FILTER_RESULT", "payload": {...}}`,
//! so stage traffic can be logged or replayed as JSON.

use crate::filter::{FileDescriptor, FilteredFileDescriptor};
use crate::rules::RuleSet;
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Payload of a `FILTER_FILES` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    #[serde(serialize_with = "serialize_shared_files")]
    pub files: Arc<[FileDescriptor]>,
    pub rule_sets: Vec<RuleSet>,
    pub root_key: String,
}

/// Payload of a `GENERATE_SNAPSHOT` request. Files are already filtered and bound to content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    pub files: Vec<FileDescriptor>,
    pub project_name: String,
}

/// A request as it travels to a stage unit. Content handles are not serialised.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageRequest<'a> {
    FilterFiles(&'a FilterRequest),
    GenerateSnapshot(&'a SnapshotRequest),
}

fn serialize_shared_files<S>(
    files: &Arc<[FileDescriptor]>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    files.as_ref().serialize(serializer)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum FilterResponse {
    FilterResult {
        filtered_files: Vec<FilteredFileDescriptor>,
    },
    FilterError {
        message: String,
    },
}

pub fn filter_failure(detail: impl std::fmt::Display) -> String {
    format!("An error occurred during file filtering: {}", detail)
}

pub fn snapshot_failure(detail: impl std::fmt::Display) -> String {
    format!("An error occurred during snapshot generation: {}", detail)
}

impl FilterResponse {
    pub fn error(detail: impl std::fmt::Display) -> Self {
        FilterResponse::FilterError {
            message: filter_failure(detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum SnapshotResponse {
    StatusUpdate { message: String },
    SnapshotResult { content: String },
    SnapshotError { message: String },
}

impl SnapshotResponse {
    pub fn status(message: impl Into<String>) -> Self {
        SnapshotResponse::StatusUpdate {
            message: message.into(),
        }
    }

    pub fn error(detail: impl std::fmt::Display) -> Self {
        SnapshotResponse::SnapshotError {
            message: snapshot_failure(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_result_wire_shape() {
        let response = FilterResponse::FilterResult {
            filtered_files: vec![FilteredFileDescriptor {
                relative_path: "proj/src/a.ts".to_string(),
                size: 100,
            }],
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "type": "FILTER_RESULT",
                "payload": { "filteredFiles": [{ "relativePath": "proj/src/a.ts", "size": 100 }] }
            })
        );
    }

    #[test]
    fn requests_are_tagged_without_content() {
        let request = FilterRequest {
            files: vec![FileDescriptor::new(
                "proj/a.ts",
                9,
                crate::filter::ContentHandle::from_text("export {}"),
            )]
            .into(),
            rule_sets: vec![RuleSet::new("proj/.gitignore", "*.log")],
            root_key: "proj".to_string(),
        };
        assert_eq!(
            serde_json::to_value(StageRequest::FilterFiles(&request)).unwrap(),
            json!({
                "type": "FILTER_FILES",
                "payload": {
                    "files": [{ "relativePath": "proj/a.ts", "size": 9 }],
                    "ruleSets": [{ "origin": "proj/.gitignore", "content": "*.log" }],
                    "rootKey": "proj"
                }
            })
        );

        let request = SnapshotRequest {
            files: Vec::new(),
            project_name: "proj".to_string(),
        };
        assert_eq!(
            serde_json::to_value(StageRequest::GenerateSnapshot(&request)).unwrap(),
            json!({
                "type": "GENERATE_SNAPSHOT",
                "payload": { "files": [], "projectName": "proj" }
            })
        );
    }

    #[test]
    fn snapshot_messages_wire_shape() {
        assert_eq!(
            serde_json::to_value(SnapshotResponse::status("Generating project tree...")).unwrap(),
            json!({ "type": "STATUS_UPDATE", "payload": { "message": "Generating project tree..." } })
        );
        assert_eq!(
            serde_json::to_value(SnapshotResponse::error("disk gone")).unwrap(),
            json!({
                "type": "SNAPSHOT_ERROR",
                "payload": { "message": "An error occurred during snapshot generation: disk gone" }
            })
        );
    }
}

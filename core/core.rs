pub mod config;
pub mod defaults;
pub mod error;
pub mod filter;
pub mod gather;
pub mod pipeline;
pub mod protocol;
pub mod rules;
pub mod snapshot;
pub mod tree;

pub use config::{Config, FilterConfig, GeneralConfig, OutputConfig, WatchConfig};
pub use error::{AppError, Result};
pub use filter::{
    ContentHandle, FileDescriptor, FileVerdict, FilterPolicy, FilteredFileDescriptor,
    classify_file, explain_files, filter_files,
};
pub use gather::{gather_file_set, rule_set_origin, to_slash_relative};
pub use pipeline::{FileSet, PipelineCoordinator, PipelineEvent, PipelinePhase, PipelineSettings};
pub use protocol::{FilterRequest, FilterResponse, SnapshotRequest, SnapshotResponse};
pub use rules::{PatternCache, RuleCascadeIndex, RuleMatch, RuleSet};
pub use snapshot::{LanguageTable, assemble_snapshot, snapshot_file_name};
pub use tree::{TreeNode, build_project_tree, format_file_size};

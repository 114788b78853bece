use crate::defaults::{DEFAULT_RULE_FILE_NAME, get_builtin_defaults};
use crate::error::Result;
use crate::rules::{PatternCache, RuleCascadeIndex, RuleMatch, RuleSet};
use log;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;

/// Where a file's bytes come from when the snapshot is assembled.
#[derive(Debug, Clone)]
pub enum ContentHandle {
    Disk(PathBuf),
    Memory(Arc<[u8]>),
}

impl ContentHandle {
    pub fn from_text(text: &str) -> Self {
        ContentHandle::Memory(Arc::from(text.as_bytes()))
    }

    /// Reads the content, replacing invalid UTF-8 sequences.
    pub async fn read_text(&self) -> std::io::Result<String> {
        match self {
            ContentHandle::Disk(path) => {
                let bytes = tokio::fs::read(path).await?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            ContentHandle::Memory(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Slash-separated, beginning with the project folder name.
    pub relative_path: String,
    pub size: u64,
    #[serde(skip)]
    pub content: ContentHandle,
}

impl FileDescriptor {
    pub fn new(relative_path: impl Into<String>, size: u64, content: ContentHandle) -> Self {
        Self {
            relative_path: relative_path.into(),
            size,
            content,
        }
    }

    pub fn file_name(&self) -> &str {
        file_name(&self.relative_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredFileDescriptor {
    pub relative_path: String,
    pub size: u64,
}

impl From<&FileDescriptor> for FilteredFileDescriptor {
    fn from(file: &FileDescriptor) -> Self {
        Self {
            relative_path: file.relative_path.clone(),
            size: file.size,
        }
    }
}

/// Structural exclusion settings. Names and extensions are held lowercase.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPolicy {
    pub max_file_size: u64,
    pub rule_file_name: String,
    ignored_directories: HashSet<String>,
    ignored_files: HashSet<String>,
    binary_extensions: HashSet<String>,
}

impl FilterPolicy {
    pub fn new<D, F, E>(
        max_file_size: u64,
        rule_file_name: impl Into<String>,
        ignored_directories: D,
        ignored_files: F,
        binary_extensions: E,
    ) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            max_file_size,
            rule_file_name: rule_file_name.into(),
            ignored_directories: lowercase_set(ignored_directories),
            ignored_files: lowercase_set(ignored_files),
            binary_extensions: lowercase_set(binary_extensions)
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
        }
    }

    /// The embedded defaults with a 1 MiB size cap.
    pub fn builtin() -> Self {
        let defaults = get_builtin_defaults();
        Self::new(
            DEFAULT_MAX_FILE_SIZE_BYTES,
            DEFAULT_RULE_FILE_NAME,
            &defaults.ignored_directories,
            &defaults.ignored_files,
            &defaults.binary_extensions,
        )
    }

    pub fn is_ignored_directory(&self, name: &str) -> bool {
        self.ignored_directories.contains(&name.to_lowercase())
    }

    pub fn ignored_directories(&self) -> &HashSet<String> {
        &self.ignored_directories
    }

    pub fn ignored_files(&self) -> &HashSet<String> {
        &self.ignored_files
    }

    pub fn binary_extensions(&self) -> &HashSet<String> {
        &self.binary_extensions
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

fn lowercase_set<I>(items: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Outcome of the per-file checks, cheapest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FileVerdict {
    Included,
    TooLarge { size: u64, limit: u64 },
    BinaryExtension { extension: String },
    IgnoredDirectory { directory: String },
    IgnoredFile,
    IgnoreRule(RuleMatch),
}

impl FileVerdict {
    pub fn is_included(&self) -> bool {
        matches!(self, FileVerdict::Included)
    }

    pub fn describe(&self) -> String {
        match self {
            FileVerdict::Included => "included".to_string(),
            FileVerdict::TooLarge { size, limit } => {
                format!("too large ({} > {} bytes)", size, limit)
            }
            FileVerdict::BinaryExtension { extension } => format!("binary extension .{}", extension),
            FileVerdict::IgnoredDirectory { directory } => {
                format!("path segment '{}' is an ignored directory name", directory)
            }
            FileVerdict::IgnoredFile => "ignored file name".to_string(),
            FileVerdict::IgnoreRule(hit) => format!("rule '{}' from {}", hit.pattern, hit.origin),
        }
    }
}

pub fn file_name(relative_path: &str) -> &str {
    relative_path.rsplit('/').next().unwrap_or(relative_path)
}

/// Strips the leading `<root_key>/` segment, if present.
pub fn project_relative_path<'a>(relative_path: &'a str, root_key: &str) -> &'a str {
    if root_key.is_empty() {
        return relative_path;
    }
    relative_path
        .strip_prefix(root_key)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(relative_path)
}

pub fn classify_file(
    relative_path: &str,
    size: u64,
    root_key: &str,
    policy: &FilterPolicy,
    rules: &RuleCascadeIndex,
) -> FileVerdict {
    if size > policy.max_file_size {
        return FileVerdict::TooLarge {
            size,
            limit: policy.max_file_size,
        };
    }

    let lower_name = file_name(relative_path).to_lowercase();
    if let Some((_, extension)) = lower_name.rsplit_once('.') {
        if policy.binary_extensions.contains(extension) {
            return FileVerdict::BinaryExtension {
                extension: extension.to_string(),
            };
        }
    }

    let project_path = project_relative_path(relative_path, root_key);
    if let Some(directory) = project_path
        .split('/')
        .find(|segment| policy.is_ignored_directory(segment))
    {
        return FileVerdict::IgnoredDirectory {
            directory: directory.to_string(),
        };
    }

    if policy.ignored_files.contains(&lower_name) {
        return FileVerdict::IgnoredFile;
    }

    match rules.matching_rule(project_path) {
        Some(hit) => FileVerdict::IgnoreRule(hit),
        None => FileVerdict::Included,
    }
}

/// Keeps the files that survive every check, in input order.
pub fn filter_files(
    files: &[FileDescriptor],
    rule_sets: &[RuleSet],
    root_key: &str,
    policy: &FilterPolicy,
    cache: &PatternCache,
) -> Result<Vec<FilteredFileDescriptor>> {
    log::debug!(
        "Filtering {} files against {} rule set(s) (root '{}')",
        files.len(),
        rule_sets.len(),
        root_key
    );
    let index = RuleCascadeIndex::build(rule_sets, root_key, &policy.rule_file_name, cache)?;

    let filtered: Vec<FilteredFileDescriptor> = files
        .par_iter()
        .filter_map(|file| {
            match classify_file(&file.relative_path, file.size, root_key, policy, &index) {
                FileVerdict::Included => Some(FilteredFileDescriptor::from(file)),
                verdict => {
                    log::trace!("Excluding {}: {}", file.relative_path, verdict.describe());
                    None
                }
            }
        })
        .collect();

    log::debug!("{} of {} files survived filtering", filtered.len(), files.len());
    Ok(filtered)
}

/// Every file paired with its verdict, in input order.
pub fn explain_files(
    files: &[FileDescriptor],
    rule_sets: &[RuleSet],
    root_key: &str,
    policy: &FilterPolicy,
    cache: &PatternCache,
) -> Result<Vec<(FilteredFileDescriptor, FileVerdict)>> {
    let index = RuleCascadeIndex::build(rule_sets, root_key, &policy.rule_file_name, cache)?;
    Ok(files
        .par_iter()
        .map(|file| {
            let verdict = classify_file(&file.relative_path, file.size, root_key, policy, &index);
            (FilteredFileDescriptor::from(file), verdict)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, size: u64) -> FileDescriptor {
        FileDescriptor::new(path, size, ContentHandle::from_text(""))
    }

    fn verdict(path: &str, size: u64, rule_sets: &[RuleSet]) -> FileVerdict {
        let policy = FilterPolicy::builtin();
        let index =
            RuleCascadeIndex::build(rule_sets, "project", ".gitignore", &PatternCache::new())
                .unwrap();
        classify_file(path, size, "project", &policy, &index)
    }

    #[test]
    fn rejects_oversized_files() {
        assert_eq!(
            verdict("project/large.txt", 2 * 1024 * 1024, &[]),
            FileVerdict::TooLarge {
                size: 2 * 1024 * 1024,
                limit: DEFAULT_MAX_FILE_SIZE_BYTES
            }
        );
        assert!(verdict("project/exact.txt", DEFAULT_MAX_FILE_SIZE_BYTES, &[]).is_included());
    }

    #[test]
    fn rejects_binary_extensions_case_insensitively() {
        assert_eq!(
            verdict("project/image.PNG", 1024, &[]),
            FileVerdict::BinaryExtension {
                extension: "png".to_string()
            }
        );
        assert!(!verdict("project/.DS_Store", 10, &[]).is_included());
    }

    #[test]
    fn file_without_dot_has_no_extension() {
        // "a" and "o" are binary extensions, but a bare name is not an extension
        assert!(verdict("project/src/a", 10, &[]).is_included());
    }

    #[test]
    fn rejects_ignored_directories() {
        assert_eq!(
            verdict("project/node_modules/package/index.js", 1024, &[]),
            FileVerdict::IgnoredDirectory {
                directory: "node_modules".to_string()
            }
        );
        assert!(!verdict("project/pkg/Target/out.rs", 10, &[]).is_included());
    }

    #[test]
    fn file_named_like_ignored_directory_is_rejected() {
        assert_eq!(
            verdict("project/scripts/build", 10, &[]),
            FileVerdict::IgnoredDirectory {
                directory: "build".to_string()
            }
        );
        assert_eq!(
            verdict("project/Debug", 10, &[]),
            FileVerdict::IgnoredDirectory {
                directory: "Debug".to_string()
            }
        );
        assert!(verdict("project/scripts/builder", 10, &[]).is_included());
    }

    #[test]
    fn project_folder_name_is_not_a_directory_check() {
        let policy = FilterPolicy::builtin();
        let index = RuleCascadeIndex::build(&[], "build", ".gitignore", &PatternCache::new()).unwrap();
        assert!(classify_file("build/src/main.rs", 10, "build", &policy, &index).is_included());
    }

    #[test]
    fn rejects_ignored_file_names() {
        assert_eq!(
            verdict("project/package-lock.json", 1024, &[]),
            FileVerdict::IgnoredFile
        );
    }

    #[test]
    fn consults_rules_last() {
        let rules = [RuleSet::new("project/.gitignore", "*.log")];
        assert_eq!(
            verdict("project/app.log", 1024, &rules),
            FileVerdict::IgnoreRule(RuleMatch {
                origin: "project/.gitignore".to_string(),
                pattern: "*.log".to_string(),
            })
        );
        assert!(verdict("project/src/index.ts", 1024, &rules).is_included());
    }

    #[test]
    fn filter_preserves_input_order() {
        let files = vec![
            file("project/z.ts", 1),
            file("project/a.ts", 1),
            file("project/skip.log", 1),
            file("project/m.ts", 1),
        ];
        let rules = [RuleSet::new("project/.gitignore", "*.log")];
        let policy = FilterPolicy::builtin();
        let cache = PatternCache::new();
        let kept = filter_files(&files, &rules, "project", &policy, &cache).unwrap();
        let paths: Vec<&str> = kept.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["project/z.ts", "project/a.ts", "project/m.ts"]);

        let again = filter_files(&files, &rules, "project", &policy, &cache).unwrap();
        assert_eq!(kept, again);
    }

    #[test]
    fn custom_policy_overrides_defaults() {
        let policy = FilterPolicy::new(10, ".ignore", ["Vendor"], ["SECRETS.env"], [".bin"]);
        assert!(policy.is_ignored_directory("vendor"));
        assert!(policy.ignored_files().contains("secrets.env"));
        assert!(policy.binary_extensions().contains("bin"));
        assert_eq!(policy.rule_file_name, ".ignore");
    }

    #[test]
    fn explain_reports_each_file() {
        let files = vec![file("project/a.ts", 1), file("project/b.png", 1)];
        let report = explain_files(
            &files,
            &[],
            "project",
            &FilterPolicy::builtin(),
            &PatternCache::new(),
        )
        .unwrap();
        assert_eq!(report.len(), 2);
        assert!(report[0].1.is_included());
        assert!(!report[1].1.is_included());
    }

    #[test]
    fn project_relative_path_strips_root_only() {
        assert_eq!(project_relative_path("proj/src/a.ts", "proj"), "src/a.ts");
        assert_eq!(project_relative_path("project2/a.ts", "proj"), "project2/a.ts");
        assert_eq!(project_relative_path("src/a.ts", ""), "src/a.ts");
    }
}

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::filter::{ContentHandle, FileDescriptor, FilterPolicy};
use crate::pipeline::FileSet;
use crate::rules::RuleSet;
use crate::snapshot::snapshot_file_name;
use ignore::{WalkBuilder, WalkState};
use log;
use rayon::prelude::*;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;

#[derive(Debug)]
struct WalkedFile {
    path: PathBuf,
    relative_path: String,
    size: u64,
}

/// Slash-separated path of `path` below `project_root`, or `None` if it is not below it.
pub fn to_slash_relative(project_root: &Path, path: &Path) -> Option<String> {
    let relative = pathdiff::diff_paths(path, project_root)?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Origin label for a rule file at `path`, if `path` names one.
pub fn rule_set_origin(
    project_root: &Path,
    project_name: &str,
    rule_file_name: &str,
    path: &Path,
) -> Option<String> {
    let relative = to_slash_relative(project_root, path)?;
    let file_name = relative.rsplit('/').next()?;
    if file_name != rule_file_name {
        return None;
    }
    Some(format!("{}/{}", project_name, relative))
}

/// Walks `project_root` and collects every file plus the rule sets found alongside them.
///
/// Directories named in the policy's ignored set and the save directory are
/// pruned during the walk, and a previous snapshot is never collected.
/// Everything else is left for the filter stage.
pub fn gather_file_set(
    project_root: &Path,
    project_name: &str,
    config: &Config,
    policy: &FilterPolicy,
) -> Result<FileSet> {
    if !project_root.is_dir() {
        return Err(AppError::InvalidArgument(format!(
            "Project root is not a directory: {}",
            project_root.display()
        )));
    }
    log::debug!("Starting file gathering for '{}'...", project_name);

    let save_dir = config.get_save_dir(project_root);
    let snapshot_path = save_dir.join(snapshot_file_name(&config.get_filename_base(project_name)));
    let prune_save_dir = save_dir != project_root;
    let mut builder = WalkBuilder::new(project_root);
    builder.threads(rayon::current_num_threads().min(12));
    builder.standard_filters(false);
    builder.hidden(false);
    builder.follow_links(false);

    let walker = builder.build_parallel();
    let (tx_walked, rx_walked) = mpsc::channel::<WalkedFile>();
    let tx_for_closure = tx_walked.clone();
    let project_root_clone = project_root.to_path_buf();
    let policy_for_walk = policy.clone();

    log::info!("Walking project directory: {}", project_root.display());
    walker.run(move || {
        let tx_thread = tx_for_closure.clone();
        let proj_root = project_root_clone.clone();
        let save_dir = save_dir.clone();
        let snapshot_path = snapshot_path.clone();
        let policy = policy_for_walk.clone();

        Box::new(move |entry_result| {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Error walking directory: {}", e);
                    return WalkState::Continue;
                }
            };
            if entry.depth() == 0 {
                return WalkState::Continue;
            }
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&proj_root) else {
                log::warn!("Could not get relative path for: {}", path.display());
                return WalkState::Continue;
            };
            if prune_save_dir && path.starts_with(&save_dir) {
                log::trace!("Skipping save directory: {}", path.display());
                return WalkState::Skip;
            }
            if path == snapshot_path {
                log::trace!("Skipping previous snapshot: {}", path.display());
                return WalkState::Continue;
            }

            let file_type = entry.file_type();
            if file_type.is_some_and(|ft| ft.is_dir()) {
                let name = entry.file_name().to_string_lossy();
                if policy.is_ignored_directory(&name) {
                    log::trace!("Pruning ignored directory: {}", relative.display());
                    return WalkState::Skip;
                }
                return WalkState::Continue;
            }
            if !file_type.is_some_and(|ft| ft.is_file()) {
                return WalkState::Continue;
            }

            let Some(relative_path) = to_slash_relative(&proj_root, path) else {
                return WalkState::Continue;
            };
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    log::warn!("Could not read metadata for {}: {}", path.display(), e);
                    return WalkState::Continue;
                }
            };
            if tx_thread
                .send(WalkedFile {
                    path: path.to_path_buf(),
                    relative_path,
                    size,
                })
                .is_err()
            {
                log::error!("Receiver dropped for walked paths, stopping walk early.");
                return WalkState::Quit;
            }
            WalkState::Continue
        })
    });
    drop(tx_walked);

    let mut walked: Vec<WalkedFile> = rx_walked.into_iter().collect();
    walked.par_sort_unstable_by(|a, b| a.relative_path.cmp(&b.relative_path));
    log::info!("Directory walk complete. Found {} files.", walked.len());

    let rule_file_name = policy.rule_file_name.as_str();
    let mut rule_sets: Vec<RuleSet> = walked
        .par_iter()
        .filter(|file| file.relative_path.rsplit('/').next() == Some(rule_file_name))
        .map(|file| {
            let content = fs::read_to_string(&file.path).unwrap_or_else(|e| {
                log::warn!(
                    "Could not read rule file {}: {}. Treating it as empty.",
                    file.path.display(),
                    e
                );
                String::new()
            });
            RuleSet::new(format!("{}/{}", project_name, file.relative_path), content)
        })
        .collect();

    if rule_sets.is_empty() {
        log::debug!("No {} files found; using the default rule set.", rule_file_name);
        rule_sets.push(config.default_rule_set());
    } else {
        rule_sets.sort_by(|a, b| a.origin.cmp(&b.origin));
        log::debug!("Loaded {} rule file(s).", rule_sets.len());
    }

    let files = walked
        .into_iter()
        .map(|file| {
            FileDescriptor::new(
                format!("{}/{}", project_name, file.relative_path),
                file.size,
                ContentHandle::Disk(file.path),
            )
        })
        .collect();

    Ok(FileSet {
        project_name: project_name.to_string(),
        files,
        rule_sets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_relative_paths() {
        let root = Path::new("/work/proj");
        assert_eq!(
            to_slash_relative(root, Path::new("/work/proj/src/a.ts")),
            Some("src/a.ts".to_string())
        );
        assert_eq!(to_slash_relative(root, Path::new("/work/proj")), None);
        assert_eq!(to_slash_relative(root, Path::new("/work/other/a.ts")), None);
    }

    #[test]
    fn rule_origins() {
        let root = Path::new("/work/proj");
        assert_eq!(
            rule_set_origin(root, "proj", ".gitignore", Path::new("/work/proj/src/.gitignore")),
            Some("proj/src/.gitignore".to_string())
        );
        assert_eq!(
            rule_set_origin(root, "proj", ".gitignore", Path::new("/work/proj/src/main.rs")),
            None
        );
    }
}

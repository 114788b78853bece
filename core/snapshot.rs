use crate::defaults::get_builtin_defaults;
use crate::error::Result;
use crate::filter::{FileDescriptor, file_name};
use crate::protocol::SnapshotResponse;
use crate::tree::build_project_tree;
use indexmap::IndexMap;
use log;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const SNAPSHOT_FILE_SUFFIX: &str = "-snapshot.md";

/// Extension → fence language tag. Keys are lowercase, without the dot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageTable {
    tags: HashMap<String, String>,
}

impl LanguageTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let tags = entries
            .into_iter()
            .map(|(ext, tag)| {
                (
                    ext.as_ref().trim_start_matches('.').to_lowercase(),
                    tag.into(),
                )
            })
            .collect();
        Self { tags }
    }

    pub fn builtin() -> Self {
        Self::new(get_builtin_defaults().languages.iter().map(|(k, v)| (k, v.clone())))
    }

    /// Later entries win over existing ones.
    pub fn extend_from(&mut self, overrides: &IndexMap<String, String>) {
        for (ext, tag) in overrides {
            self.tags
                .insert(ext.trim_start_matches('.').to_lowercase(), tag.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tag for a file name, or `""` when the extension is unknown or absent.
    pub fn tag_for(&self, name: &str) -> &str {
        name.rsplit_once('.')
            .and_then(|(_, ext)| self.tags.get(&ext.to_lowercase()))
            .map(String::as_str)
            .unwrap_or("")
    }
}

pub fn snapshot_file_name(base: &str) -> String {
    format!("{}{}", base, SNAPSHOT_FILE_SUFFIX)
}

fn write_header(document: &mut String, project_name: &str, file_count: usize, tree: &str) {
    document.push_str(&format!("# Project Snapshot: {}\n\n", project_name));
    document.push_str(
        "This file contains a snapshot of the project structure and source code, formatted for AI consumption.\n",
    );
    document.push_str(&format!("Total files included: {}\n\n", file_count));
    document.push_str("## Project Structure\n\n");
    document.push_str(&format!("```\n{}\n```\n\n", tree));
    document.push_str("## File Contents\n\n");
}

/// Builds the snapshot document, reporting progress on `progress`.
///
/// Returns `Ok(None)` if `cancel` fires or the progress receiver goes away; a
/// stopped assembly produces nothing. Unreadable files become error blocks.
pub async fn assemble_snapshot(
    files: &[FileDescriptor],
    project_name: &str,
    languages: &LanguageTable,
    progress: &mpsc::Sender<SnapshotResponse>,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    if !report(progress, "Generating project tree...").await {
        return Ok(None);
    }

    let mut sorted: Vec<&FileDescriptor> = files.iter().collect();
    sorted.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    let tree = build_project_tree(&sorted, project_name);

    let mut document = String::new();
    write_header(&mut document, project_name, sorted.len(), &tree);

    if !report(
        progress,
        format!("Reading contents of {} files...", sorted.len()),
    )
    .await
    {
        return Ok(None);
    }

    for file in sorted {
        if cancel.is_cancelled() {
            log::debug!("Snapshot assembly cancelled before {}", file.relative_path);
            return Ok(None);
        }
        match file.content.read_text().await {
            Ok(content) => {
                let tag = languages.tag_for(file_name(&file.relative_path));
                document.push_str(&format!("```{}:{}\n", tag, file.relative_path));
                document.push_str(&content);
                document.push_str("\n```\n\n");
            }
            Err(e) => {
                log::warn!("Could not read {}: {}", file.relative_path, e);
                document.push_str(&format!(
                    "```error:Could not read {}\nError: {}\n```\n\n",
                    file.relative_path, e
                ));
            }
        }
    }

    log::debug!(
        "Assembled snapshot for '{}' ({} bytes)",
        project_name,
        document.len()
    );
    Ok(Some(document))
}

async fn report(progress: &mpsc::Sender<SnapshotResponse>, message: impl Into<String>) -> bool {
    let message = message.into();
    log::info!("{}", message);
    progress.send(SnapshotResponse::status(message)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ContentHandle;

    fn memory(path: &str, text: &str) -> FileDescriptor {
        FileDescriptor::new(path, text.len() as u64, ContentHandle::from_text(text))
    }

    async fn assemble(files: &[FileDescriptor]) -> (Option<String>, Vec<SnapshotResponse>) {
        let (tx, mut rx) = mpsc::channel(16);
        let result = assemble_snapshot(
            files,
            "proj",
            &LanguageTable::builtin(),
            &tx,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        drop(tx);
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }
        (result, messages)
    }

    #[test]
    fn language_tags_are_case_insensitive() {
        let table = LanguageTable::builtin();
        assert_eq!(table.tag_for("a.ts"), "typescript");
        assert_eq!(table.tag_for("A.PY"), "python");
        assert_eq!(table.tag_for("archive.tar.gz"), "");
        assert_eq!(table.tag_for("Makefile"), "");
    }

    #[test]
    fn overrides_replace_builtin_tags() {
        let mut table = LanguageTable::builtin();
        let mut extra = IndexMap::new();
        extra.insert(".TS".to_string(), "ts".to_string());
        extra.insert("hbs".to_string(), "handlebars".to_string());
        table.extend_from(&extra);
        assert_eq!(table.tag_for("x.ts"), "ts");
        assert_eq!(table.tag_for("x.hbs"), "handlebars");
    }

    #[tokio::test]
    async fn files_are_emitted_in_path_order() {
        let files = vec![memory("proj/b.py", "print(1)"), memory("proj/a.ts", "let a = 1;")];
        let (document, messages) = assemble(&files).await;
        let document = document.unwrap();

        let expected = concat!(
            "# Project Snapshot: proj\n\n",
            "This file contains a snapshot of the project structure and source code, formatted for AI consumption.\n",
            "Total files included: 2\n\n",
            "## Project Structure\n\n",
            "```\n.\n├── [    10 B] a.ts\n└── [     8 B] b.py\n\n```\n\n",
            "## File Contents\n\n",
            "```typescript:proj/a.ts\nlet a = 1;\n```\n\n",
            "```python:proj/b.py\nprint(1)\n```\n\n",
        );
        assert_eq!(document, expected);
        assert_eq!(
            messages,
            vec![
                SnapshotResponse::status("Generating project tree..."),
                SnapshotResponse::status("Reading contents of 2 files..."),
            ]
        );
    }

    #[tokio::test]
    async fn unreadable_file_becomes_error_block() {
        let missing = FileDescriptor::new(
            "proj/gone.rs",
            3,
            ContentHandle::Disk("/nonexistent/xsnapshot/gone.rs".into()),
        );
        let files = vec![missing, memory("proj/z.md", "# z")];
        let (document, _) = assemble(&files).await;
        let document = document.unwrap();

        assert!(document.contains("```error:Could not read proj/gone.rs\nError: "));
        assert!(document.contains("```markdown:proj/z.md\n# z\n```\n\n"));
        let error_at = document.find("error:Could not read").unwrap();
        let next_at = document.find("markdown:proj/z.md").unwrap();
        assert!(error_at < next_at);
    }

    #[tokio::test]
    async fn cancelled_assembly_yields_nothing() {
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = assemble_snapshot(
            &[memory("proj/a.ts", "x")],
            "proj",
            &LanguageTable::builtin(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn snapshot_file_names() {
        assert_eq!(snapshot_file_name("proj"), "proj-snapshot.md");
    }
}

use crate::filter::{FileDescriptor, FilteredFileDescriptor, project_relative_path};
use log;
use serde::Serialize;
use std::collections::BTreeMap;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const CONTINUATION: &str = "│   ";
const BLANK: &str = "    ";

/// Anything with a slash-separated path and a byte size can be placed in the tree.
pub trait TreeEntry {
    fn relative_path(&self) -> &str;
    fn size(&self) -> u64;
}

impl TreeEntry for FileDescriptor {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl<T: TreeEntry + ?Sized> TreeEntry for &T {
    fn relative_path(&self) -> &str {
        (**self).relative_path()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl TreeEntry for FilteredFileDescriptor {
    fn relative_path(&self) -> &str {
        &self.relative_path
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File { size: u64 },
    Directory { children: BTreeMap<String, TreeNode> },
}

impl TreeNode {
    fn empty_directory() -> Self {
        TreeNode::Directory {
            children: BTreeMap::new(),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, TreeNode::Directory { .. })
    }
}

/// Nested map of project-relative path segments. The root is always a directory.
pub fn build_tree<T: TreeEntry>(files: &[T], root_key: &str) -> TreeNode {
    let mut root = TreeNode::empty_directory();
    for file in files {
        let path = project_relative_path(file.relative_path(), root_key);
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        if components.is_empty() {
            log::warn!("Skipping empty path in tree: '{}'", file.relative_path());
            continue;
        }
        insert_node(&mut root, &components, file.size());
    }
    root
}

fn insert_node(node: &mut TreeNode, components: &[&str], size: u64) {
    let TreeNode::Directory { children } = node else {
        return;
    };
    let (name, remaining) = match components.split_first() {
        Some(split) => split,
        None => return,
    };

    if remaining.is_empty() {
        // A directory already registered under this name keeps precedence.
        match children.get(*name) {
            Some(existing) if existing.is_directory() => {
                log::debug!("Tree conflict: '{}' is both a file and a directory", name);
            }
            _ => {
                children.insert(name.to_string(), TreeNode::File { size });
            }
        }
        return;
    }

    let child = children
        .entry(name.to_string())
        .or_insert_with(TreeNode::empty_directory);
    if !child.is_directory() {
        log::debug!("Tree conflict: '{}' is both a file and a directory", name);
        *child = TreeNode::empty_directory();
    }
    insert_node(child, remaining, size);
}

/// Renders the project tree, starting with a `.` line.
pub fn render_tree(root: &TreeNode) -> String {
    let mut output = String::from(".\n");
    if let TreeNode::Directory { children } = root {
        render_children(children, "", &mut output);
    }
    output
}

fn render_children(children: &BTreeMap<String, TreeNode>, prefix: &str, output: &mut String) {
    let mut entries: Vec<(&String, &TreeNode)> = children.iter().collect();
    // BTreeMap order is already lexical; a stable sort moves directories first.
    entries.sort_by_key(|(_, node)| !node.is_directory());

    let count = entries.len();
    for (index, (name, node)) in entries.into_iter().enumerate() {
        let is_last = index + 1 == count;
        let connector = if is_last { LAST_BRANCH } else { BRANCH };
        match node {
            TreeNode::File { size } => {
                output.push_str(&format!(
                    "{}{}[{:>8}] {}\n",
                    prefix,
                    connector,
                    format_file_size(*size),
                    name
                ));
            }
            TreeNode::Directory { children } => {
                output.push_str(&format!("{}{}{}/\n", prefix, connector, name));
                let child_prefix = format!("{}{}", prefix, if is_last { BLANK } else { CONTINUATION });
                render_children(children, &child_prefix, output);
            }
        }
    }
}

pub fn build_project_tree<T: TreeEntry>(files: &[T], root_key: &str) -> String {
    log::debug!("Building project tree from {} files", files.len());
    render_tree(&build_tree(files, root_key))
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let kb = bytes as f64 / 1024.0;
    if kb < 1024.0 {
        return format!("{:.1} KB", kb);
    }
    format!("{:.2} MB", kb / 1024.0)
}

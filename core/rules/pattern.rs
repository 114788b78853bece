use crate::error::{AppError, Result};
use log;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// One compiled ignore line.
///
/// The matcher is tested against a slash-separated path relative to the
/// directory that owns the rule set.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    directory_only: bool,
    matcher: Regex,
}

impl CompiledPattern {
    pub fn compile(source: &str) -> Result<Self> {
        let directory_only = source.ends_with('/');
        let body = if directory_only {
            &source[..source.len() - 1]
        } else {
            source
        };

        let rooted = body.contains('/');
        let body = if rooted {
            body.strip_prefix('/').unwrap_or(body)
        } else {
            body
        };

        let anchor = if rooted { "^" } else { "(?:^|/)" };
        let boundary = if directory_only { "/" } else { "(?:/|$)" };
        let expression = format!("{}{}{}", anchor, glob_to_regex(body), boundary);
        log::trace!("Compiled ignore pattern '{}' as /{}/", source, expression);

        let matcher = Regex::new(&expression).map_err(|e| AppError::pattern(source, e))?;
        Ok(Self {
            source: source.to_string(),
            directory_only,
            matcher,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_directory_only(&self) -> bool {
        self.directory_only
    }

    pub fn is_match(&self, relative_path: &str) -> bool {
        self.matcher.is_match(relative_path)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut expression = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                expression.push_str(".*");
            }
            '*' => expression.push_str("[^/]*"),
            '?' => expression.push_str("[^/]"),
            other => {
                let mut buf = [0u8; 4];
                expression.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    expression
}

/// Splits rule-file content into pattern lines, dropping blanks and `#` comments.
pub fn parse_rule_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Memoises compiled patterns by their exact source text.
#[derive(Debug, Default)]
pub struct PatternCache {
    entries: RwLock<HashMap<String, Arc<CompiledPattern>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, source: &str) -> Result<Arc<CompiledPattern>> {
        if let Some(hit) = self
            .entries
            .read()
            .map_err(|_| AppError::Stage("pattern cache lock poisoned".to_string()))?
            .get(source)
        {
            return Ok(Arc::clone(hit));
        }

        let compiled = Arc::new(CompiledPattern::compile(source)?);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AppError::Stage("pattern cache lock poisoned".to_string()))?;
        let entry = entries
            .entry(source.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

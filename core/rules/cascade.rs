use super::pattern::{CompiledPattern, PatternCache, parse_rule_lines};
use crate::error::Result;
use log;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Content of one ignore file, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub origin: String,
    pub content: String,
}

impl RuleSet {
    pub fn new(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    origin: String,
    patterns: Vec<Arc<CompiledPattern>>,
}

impl CompiledRuleSet {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn patterns(&self) -> &[Arc<CompiledPattern>] {
        &self.patterns
    }

    fn first_match(&self, relative_path: &str) -> Option<&CompiledPattern> {
        self.patterns
            .iter()
            .map(Arc::as_ref)
            .find(|pattern| pattern.is_match(relative_path))
    }
}

/// Which rule set and line excluded a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMatch {
    pub origin: String,
    pub pattern: String,
}

/// Directory key → compiled rule set, resolved root first then nearest ancestor outward.
///
/// A match at any level excludes the path. There is no negation and no way for
/// a deeper rule set to re-include something a shallower one excluded.
#[derive(Debug, Clone)]
pub struct RuleCascadeIndex {
    root_key: String,
    entries: HashMap<String, CompiledRuleSet>,
}

impl RuleCascadeIndex {
    pub fn build(
        rule_sets: &[RuleSet],
        root_key: &str,
        rule_file_name: &str,
        cache: &PatternCache,
    ) -> Result<Self> {
        let mut entries = HashMap::with_capacity(rule_sets.len());
        for rule_set in rule_sets {
            let key = directory_key(&rule_set.origin, root_key, rule_file_name);
            let patterns = parse_rule_lines(&rule_set.content)
                .map(|line| cache.get_or_compile(line))
                .collect::<Result<Vec<_>>>()?;
            log::trace!(
                "Rule set '{}' keyed at '{}' with {} pattern(s)",
                rule_set.origin,
                key,
                patterns.len()
            );
            if entries
                .insert(
                    key.clone(),
                    CompiledRuleSet {
                        origin: rule_set.origin.clone(),
                        patterns,
                    },
                )
                .is_some()
            {
                log::debug!("Rule set '{}' replaced an earlier one at '{}'", rule_set.origin, key);
            }
        }
        Ok(Self {
            root_key: root_key.to_string(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, directory_key: &str) -> Option<&CompiledRuleSet> {
        self.entries.get(directory_key)
    }

    /// Keys in sorted order, for stable diagnostics.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// `candidate` is relative to the project root.
    pub fn is_excluded(&self, candidate: &str) -> bool {
        self.matching_rule(candidate).is_some()
    }

    pub fn matching_rule(&self, candidate: &str) -> Option<RuleMatch> {
        if let Some(root_rules) = self.entries.get(&self.root_key) {
            if let Some(pattern) = root_rules.first_match(candidate) {
                return Some(RuleMatch {
                    origin: root_rules.origin.clone(),
                    pattern: pattern.source().to_string(),
                });
            }
        }

        let segments: Vec<&str> = candidate.split('/').collect();
        for depth in (0..segments.len().saturating_sub(1)).rev() {
            let relative_dir = segments[..=depth].join("/");
            let key = if self.root_key.is_empty() {
                relative_dir
            } else {
                format!("{}/{}", self.root_key, relative_dir)
            };
            let Some(nested) = self.entries.get(&key) else {
                continue;
            };
            let relative_to_rules = segments[depth + 1..].join("/");
            if let Some(pattern) = nested.first_match(&relative_to_rules) {
                return Some(RuleMatch {
                    origin: nested.origin.clone(),
                    pattern: pattern.source().to_string(),
                });
            }
        }
        None
    }
}

/// Directory that owns a rule set.
///
/// `proj/src/.gitignore` is keyed at `proj/src`; a top-level `.gitignore` or any
/// synthetic label (such as the default rules) is keyed at the project root.
pub fn directory_key(origin: &str, root_key: &str, rule_file_name: &str) -> String {
    let file_name = origin.rsplit('/').next().unwrap_or(origin);
    if file_name != rule_file_name {
        return root_key.to_string();
    }
    match origin.rfind('/') {
        Some(separator) => origin[..separator].to_string(),
        None => root_key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(rule_sets: &[RuleSet]) -> RuleCascadeIndex {
        RuleCascadeIndex::build(rule_sets, "proj", ".gitignore", &PatternCache::new()).unwrap()
    }

    #[test]
    fn directory_keys() {
        assert_eq!(directory_key("proj/.gitignore", "proj", ".gitignore"), "proj");
        assert_eq!(directory_key("proj/src/.gitignore", "proj", ".gitignore"), "proj/src");
        assert_eq!(directory_key(".gitignore", "proj", ".gitignore"), "proj");
        assert_eq!(directory_key("Default Ignore Rules", "proj", ".gitignore"), "proj");
        assert_eq!(directory_key("proj/src/not.gitignore", "proj", ".gitignore"), "proj");
    }

    #[test]
    fn root_rules_apply_everywhere() {
        let idx = index(&[RuleSet::new("proj/.gitignore", "*.js")]);
        assert!(idx.is_excluded("src/index.js"));
        assert!(idx.is_excluded("index.js"));
        assert!(!idx.is_excluded("src/index.ts"));
    }

    #[test]
    fn nested_rules_are_relative_to_their_directory() {
        let idx = index(&[RuleSet::new("proj/src/.gitignore", "temp/\n/generated")]);
        assert!(idx.is_excluded("src/temp/t.tmp"));
        assert!(idx.is_excluded("src/generated/api.ts"));
        assert!(!idx.is_excluded("src/keep.ts"));
        // rooted at proj/src, so a top-level generated/ is untouched
        assert!(!idx.is_excluded("generated/api.ts"));
        // rules in src do not reach siblings
        assert!(!idx.is_excluded("lib/temp/t.tmp"));
    }

    #[test]
    fn any_level_excludes() {
        let idx = index(&[
            RuleSet::new("proj/.gitignore", "*.log"),
            RuleSet::new("proj/a/.gitignore", "*.tmp"),
            RuleSet::new("proj/a/b/.gitignore", "keep-me.txt"),
        ]);
        assert!(idx.is_excluded("a/b/debug.log"));
        assert!(idx.is_excluded("a/b/x.tmp"));
        assert!(idx.is_excluded("a/b/keep-me.txt"));
        assert!(!idx.is_excluded("a/keep-me.txt"));
    }

    #[test]
    fn nearest_ancestor_reported_first() {
        let idx = index(&[
            RuleSet::new("proj/a/.gitignore", "*.tmp"),
            RuleSet::new("proj/a/b/.gitignore", "*.tmp"),
        ]);
        let hit = idx.matching_rule("a/b/x.tmp").unwrap();
        assert_eq!(hit.origin, "proj/a/b/.gitignore");
        assert_eq!(hit.pattern, "*.tmp");
    }

    #[test]
    fn later_rule_sets_overwrite_same_key() {
        let idx = index(&[
            RuleSet::new("Default Ignore Rules", "*.log"),
            RuleSet::new("proj/.gitignore", "*.tmp"),
        ]);
        assert_eq!(idx.len(), 1);
        assert!(!idx.is_excluded("app.log"));
        assert!(idx.is_excluded("app.tmp"));
    }

    #[test]
    fn empty_root_key_uses_bare_directories() {
        let idx = RuleCascadeIndex::build(
            &[RuleSet::new("src/.gitignore", "*.gen")],
            "",
            ".gitignore",
            &PatternCache::new(),
        )
        .unwrap();
        assert!(idx.is_excluded("src/a.gen"));
        assert!(!idx.is_excluded("a.gen"));
    }

    #[test]
    fn keys_are_sorted() {
        let idx = index(&[
            RuleSet::new("proj/z/.gitignore", "a"),
            RuleSet::new("proj/.gitignore", "b"),
            RuleSet::new("proj/m/.gitignore", "c"),
        ]);
        assert_eq!(idx.keys(), vec!["proj", "proj/m", "proj/z"]);
    }
}

//! Gitignore-style rule engine: pattern compilation and per-directory cascading.
//!
//! This is a deliberately reduced dialect. `!` negation is not supported and a
//! nested rule file cannot re-include a path excluded by an ancestor.

pub mod cascade;
pub mod pattern;

pub use cascade::{CompiledRuleSet, RuleCascadeIndex, RuleMatch, RuleSet, directory_key};
pub use pattern::{CompiledPattern, PatternCache, parse_rule_lines};

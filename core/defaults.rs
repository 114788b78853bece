use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Deserialize;

pub const DEFAULT_RULES_LABEL: &str = "Default Ignore Rules";
pub const DEFAULT_RULE_FILE_NAME: &str = ".gitignore";
pub const DEFAULT_MAX_FILE_SIZE: &str = "1MiB";

#[derive(Debug, Default, Deserialize)]
pub struct BuiltinDefaults {
    #[serde(default)]
    pub ignored_directories: Vec<String>,
    #[serde(default)]
    pub ignored_files: Vec<String>,
    #[serde(default)]
    pub binary_extensions: Vec<String>,
    #[serde(default)]
    pub default_rules: Vec<String>,
    #[serde(default)]
    pub languages: IndexMap<String, String>,
}

static BUILTIN_DEFAULTS: Lazy<BuiltinDefaults> = Lazy::new(|| {
    let yaml_content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../data/defaults.yaml"));
    serde_yml::from_str(yaml_content).expect("Failed to parse embedded data/defaults.yaml")
});

pub fn get_builtin_defaults() -> &'static BuiltinDefaults {
    &BUILTIN_DEFAULTS
}

/// Newline-joined default rule template, used when a project ships no rule files.
pub fn default_rules_content() -> String {
    get_builtin_defaults().default_rules.join("\n")
}

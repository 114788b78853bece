use crate::defaults::{
    DEFAULT_MAX_FILE_SIZE, DEFAULT_RULE_FILE_NAME, DEFAULT_RULES_LABEL, default_rules_content,
    get_builtin_defaults,
};
use crate::error::{AppError, Result};
use crate::filter::FilterPolicy;
use crate::pipeline::PipelineSettings;
use crate::rules::RuleSet;
use crate::snapshot::LanguageTable;
use byte_unit::Byte;
use indexmap::IndexMap;
use log;
use parse_duration::parse;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = ".xtools/xsnapshot";
pub const DEFAULT_CONFIG_FILENAME: &str = "xsnapshot.toml";
pub const DEFAULT_SAVE_DIR: &str = ".xtools/xsnapshot/cache";
pub const DEFAULT_WATCH_DELAY: &str = "300ms";
pub const FALLBACK_PROJECT_NAME: &str = "project";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Extension → language tag, layered over the built-in table.
    #[serde(default)]
    pub languages: IndexMap<String, String>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub project_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default = "default_true")]
    pub enable_builtin_ignore: bool,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    #[serde(default = "default_rule_file_name")]
    pub rule_file_name: String,
    #[serde(default)]
    pub ignored_directories: Vec<String>,
    #[serde(default)]
    pub ignored_files: Vec<String>,
    #[serde(default)]
    pub binary_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_rules: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_base: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default = "default_watch_delay_string")]
    pub delay: String,
}

fn default_true() -> bool {
    true
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}
fn default_rule_file_name() -> String {
    DEFAULT_RULE_FILE_NAME.to_string()
}
fn default_save_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SAVE_DIR)
}
fn default_watch_delay_string() -> String {
    DEFAULT_WATCH_DELAY.to_string()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enable_builtin_ignore: default_true(),
            max_file_size: default_max_file_size(),
            rule_file_name: default_rule_file_name(),
            ignored_directories: Vec::new(),
            ignored_files: Vec::new(),
            binary_extensions: Vec::new(),
            default_rules: None,
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            filename_base: None,
        }
    }
}
impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            delay: default_watch_delay_string(),
        }
    }
}

impl Config {
    pub fn determine_project_root(cli_project_root: Option<&PathBuf>) -> Result<PathBuf> {
        let path_str_opt = cli_project_root
            .map(|p| p.to_string_lossy().to_string())
            .or_else(|| env::var("PROJECT_ROOT").ok().filter(|s| !s.is_empty()));

        let path_to_resolve = match path_str_opt {
            Some(p_str) => PathBuf::from(shellexpand::tilde(&p_str).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        path_to_resolve.canonicalize().map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to canonicalize project root '{}': {}",
                    path_to_resolve.display(),
                    e
                ),
            ))
        })
    }

    /// `cli_config_file` may be a path, or a bare name looked up in the default config directory.
    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        let Some(p_str) = cli_config_file else {
            let default_path = project_root
                .join(DEFAULT_CONFIG_DIR)
                .join(DEFAULT_CONFIG_FILENAME);
            if default_path.exists() {
                log::debug!("Using default config file path: {}", default_path.display());
                return Ok(Some(default_path));
            }
            log::debug!(
                "No config file specified and default not found at: {}",
                default_path.display()
            );
            return Ok(None);
        };

        let mut path = PathBuf::from(shellexpand::tilde(p_str).as_ref());
        let looks_like_path =
            path.is_absolute() || path.components().count() > 1 || p_str.contains(['/', '\\']);

        if looks_like_path {
            if !path.exists() && path.extension().is_none() {
                path.set_extension("toml");
            }
            if !path.exists() {
                return Err(AppError::Config(format!(
                    "Specified config file not found at path: {}",
                    path.display()
                )));
            }
            log::debug!("Using specified config file path: {}", path.display());
            return Ok(Some(path));
        }

        let filename = if path.extension().is_none_or(|e| e != "toml") {
            format!("{}.toml", path.to_string_lossy())
        } else {
            path.to_string_lossy().to_string()
        };
        let config_dir = project_root.join(DEFAULT_CONFIG_DIR);
        let full_path = config_dir.join(filename);
        if !full_path.exists() {
            return Err(AppError::Config(format!(
                "Specified config file '{}' not found in default directory: {}",
                path.display(),
                config_dir.display()
            )));
        }
        log::debug!(
            "Using specified config filename in default directory: {}",
            full_path.display()
        );
        Ok(Some(full_path))
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str::<Config>(content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn get_watch_delay(&self) -> Result<Duration> {
        parse(&self.watch.delay).map_err(|e| {
            AppError::InvalidArgument(format!(
                "Invalid watch delay duration '{}': {}. Use format like '500ms', '2s'.",
                self.watch.delay, e
            ))
        })
    }

    pub fn get_max_file_size_bytes(&self) -> Result<u64> {
        parse_size(&self.filter.max_file_size)
    }

    pub fn get_effective_project_name(&self, project_root: &Path) -> String {
        self.general
            .project_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                project_root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string())
            })
    }

    pub fn get_filename_base(&self, project_name: &str) -> String {
        self.output
            .filename_base
            .clone()
            .unwrap_or_else(|| project_name.to_string())
    }

    pub fn get_save_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.output.save_dir)
    }

    /// Built-in sets (unless disabled) plus the configured extras.
    pub fn filter_policy(&self) -> Result<FilterPolicy> {
        let filter = &self.filter;
        let max_file_size = self.get_max_file_size_bytes()?;
        if filter.rule_file_name.trim().is_empty() || filter.rule_file_name.contains('/') {
            return Err(AppError::Config(format!(
                "Invalid rule_file_name '{}': expected a bare file name",
                filter.rule_file_name
            )));
        }

        let mut directories = filter.ignored_directories.clone();
        let mut files = filter.ignored_files.clone();
        let mut extensions = filter.binary_extensions.clone();
        if filter.enable_builtin_ignore {
            let builtin = get_builtin_defaults();
            directories.extend(builtin.ignored_directories.iter().cloned());
            files.extend(builtin.ignored_files.iter().cloned());
            extensions.extend(builtin.binary_extensions.iter().cloned());
        } else {
            log::debug!("Built-in ignore sets disabled by configuration.");
        }

        Ok(FilterPolicy::new(
            max_file_size,
            filter.rule_file_name.trim(),
            directories,
            files,
            extensions,
        ))
    }

    pub fn language_table(&self) -> LanguageTable {
        let mut table = LanguageTable::builtin();
        table.extend_from(&self.languages);
        table
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            policy: self.filter_policy()?,
            languages: self.language_table(),
        })
    }

    /// Rule set used when a project contains no rule files.
    pub fn default_rule_set(&self) -> RuleSet {
        let content = match &self.filter.default_rules {
            Some(rules) => rules.join("\n"),
            None => default_rules_content(),
        };
        RuleSet::new(DEFAULT_RULES_LABEL, content)
    }
}

/// Parses sizes such as `"1MiB"`, `"512 KB"` or `"2048"`.
pub fn parse_size(value: &str) -> Result<u64> {
    let byte = Byte::from_str(value.trim()).map_err(|e| {
        AppError::SizeParse(format!(
            "Invalid size '{}': {}. Use a value like '1MiB' or '500KB'.",
            value, e
        ))
    })?;
    let bytes: u128 = byte.into();
    u64::try_from(bytes)
        .map_err(|_| AppError::SizeParse(format!("Size '{}' is too large", value)))
}

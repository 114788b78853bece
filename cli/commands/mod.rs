pub mod completion;
pub mod config;
pub mod debug;
pub mod files;
pub mod generate;

use crate::cli_args::{FilterOverrides, ProjectConfigOpts};
use crate::load_config_for_command;
use anyhow::{Context, Result};
use log;
use std::path::PathBuf;
use xsnapshot_core::{Config, FileSet, PipelineSettings, gather_file_set, snapshot_file_name};

/// Everything a command needs once the project root and config are settled.
pub struct ProjectSession {
    pub project_root: PathBuf,
    pub config: Config,
    pub project_name: String,
    pub settings: PipelineSettings,
}

impl ProjectSession {
    pub fn open(
        project_opts: &ProjectConfigOpts,
        filter_overrides: Option<&FilterOverrides>,
        watch_delay: Option<&String>,
    ) -> Result<Self> {
        let project_root = Config::determine_project_root(project_opts.project_root.as_ref())
            .context("Failed to determine project root")?;
        log::info!("Project root determined: {}", project_root.display());

        let config =
            load_config_for_command(&project_root, project_opts, filter_overrides, watch_delay)
                .context("Failed to load configuration")?;
        Self::from_config(project_root, config)
    }

    pub fn from_config(project_root: PathBuf, config: Config) -> Result<Self> {
        let project_name = config.get_effective_project_name(&project_root);
        let settings = config
            .pipeline_settings()
            .context("Invalid filter configuration")?;
        Ok(Self {
            project_root,
            config,
            project_name,
            settings,
        })
    }

    pub fn gather(&self) -> Result<FileSet> {
        log::debug!("Gathering files under {}", self.project_root.display());
        gather_file_set(
            &self.project_root,
            &self.project_name,
            &self.config,
            &self.settings.policy,
        )
        .with_context(|| format!("Failed to gather files from {}", self.project_root.display()))
    }

    /// Makes `-s DIR` the session's save directory, so the walk and the
    /// watcher skip it just like the configured one.
    pub fn with_save_dir(mut self, save: &Option<Option<PathBuf>>) -> Self {
        if let Some(Some(dir)) = save {
            log::debug!("Save directory overridden via CLI: {}", dir.display());
            self.config.output.save_dir = dir.clone();
        }
        self
    }

    pub fn save_dir(&self) -> PathBuf {
        self.config.get_save_dir(&self.project_root)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        let base = self.config.get_filename_base(&self.project_name);
        self.save_dir().join(snapshot_file_name(&base))
    }

    /// The snapshot file for `-s [DIR]`, or `None` for stdout.
    pub fn output_path(&self, save: &Option<Option<PathBuf>>) -> Option<PathBuf> {
        save.as_ref().map(|_| self.snapshot_path())
    }
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Specify the target project directory (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: .xtools/xsnapshot/xsnapshot.toml).",
        value_name = "CONTEXT_FILE",
        conflicts_with = "disable_context_file",
        help_heading = "Project Setup"
    )]
    pub context_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "context_file",
        help_heading = "Project Setup"
    )]
    pub disable_context_file: bool,

    #[arg(
        long,
        help = "Specify the project name (overrides config/dir name).",
        value_name = "NAME",
        help_heading = "Project Setup"
    )]
    pub project_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormatOutputOpts {
    #[arg(short = 'f', long, help = "Print structured output instead of the default view.", value_name = "FORMAT", value_parser = ["json", "yaml"], help_heading = "Output Formatting")]
    pub format: Option<String>,

    #[arg(
        long,
        help = "Pretty-print JSON output (default is compact).",
        help_heading = "Output Formatting"
    )]
    pub disable_json_minify: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterOverrides {
    #[arg(
        long,
        value_name = "SIZE",
        help = "Skip files larger than SIZE (e.g. '1MiB', '500KB').",
        help_heading = "Filtering"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        long,
        value_name = "NAME",
        help = "File name that holds ignore rules [default: .gitignore].",
        help_heading = "Filtering"
    )]
    pub rule_file_name: Option<String>,

    #[arg(
        long,
        help = "Enable built-in ignored directories, files and binary extensions [default: enabled].",
        overrides_with = "disable_builtin_ignore",
        help_heading = "Filtering"
    )]
    pub enable_builtin_ignore: bool,

    #[arg(
        long,
        help = "Disable built-in ignored directories, files and binary extensions.",
        overrides_with = "enable_builtin_ignore",
        help_heading = "Filtering"
    )]
    pub disable_builtin_ignore: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Filter a project with gitignore-style rules and assemble a single snapshot document.",
    long_about = "xsnapshot walks a project, drops files matched by ignore rules, size limits and \nbuilt-in block-lists, then writes one Markdown document holding the directory tree \nand the content of every remaining file.\n\nIgnore rules are a reduced dialect: '!' negation is not supported, and a nested \nrule file cannot re-include anything an ancestor rule file excludes.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  xsnapshot generate --save\n  xsnapshot files --tree\n  xsnapshot debug -f json\n  xsnapshot watch -s",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "g",
        visible_alias = "gen",
        about = "Generate a project snapshot."
    )]
    Generate(GenerateArgs),

    #[command(
        visible_alias = "w",
        about = "Monitor project files and regenerate the snapshot automatically."
    )]
    Watch(WatchArgs),

    #[command(
        visible_alias = "f",
        about = "List the files that survive filtering."
    )]
    Files(FilesArgs),

    #[command(
        visible_alias = "d",
        about = "Show effective configuration, rule sets and excluded files."
    )]
    Debug(DebugArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),

    #[command(about = "Show or save the default configuration file structure.")]
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOverrides,

    #[arg(
        long,
        help = "Force output of the snapshot to standard output.",
        help_heading = "Output Control",
        conflicts_with = "save"
    )]
    pub stdout: bool,

    #[arg(
        short = 's', long, value_name = "SAVE_DIR",
        num_args = 0..=1,
        help_heading = "Output Control",
        help = "Save the snapshot as <name>-snapshot.md. Optional SAVE_DIR overrides config/default logic.",
    )]
    pub save: Option<Option<PathBuf>>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOverrides,

    #[arg(
        long,
        value_name = "DELAY_STRING",
        help = "Set debounce delay for watch mode [default: 300ms]"
    )]
    pub watch_delay: Option<String>,

    #[arg( short = 's', long, value_name = "SAVE_DIR", num_args = 0..=1, help = "Save the snapshot on change. Optional SAVE_DIR overrides config/default logic.", )]
    pub save: Option<Option<PathBuf>>,
}

#[derive(Args, Debug, Clone)]
pub struct FilesArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOverrides,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,

    #[arg(long, help = "Print the project tree instead of a table.")]
    pub tree: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DebugArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub filters: FilterOverrides,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,

    #[arg(
        long,
        help = "Save default config structure to default path (prompts overwrite)."
    )]
    pub save: bool,
}

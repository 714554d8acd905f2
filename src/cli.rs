use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rctx")]
#[command(
    about = "Mirrors remote repositories locally and picks the files relevant to a query",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        help = "Output format: text, json, xml (default: text)"
    )]
    pub format: Option<String>,

    #[arg(long, global = true, help = "Directory holding the mirrors")]
    pub base_path: Option<PathBuf>,

    #[arg(long, global = true, help = "Command timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(short, long, global = true, help = "Verbose logging")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Clone or update one repository")]
    Sync(SyncArgs),

    #[command(about = "Synchronize every repository listed in a manifest")]
    SyncAll(SyncAllArgs),

    #[command(about = "Delete a local mirror")]
    Cleanup(CleanupArgs),

    #[command(about = "Show local mirrors and their state")]
    Status(StatusArgs),

    #[command(about = "Check that a remote answers without cloning it")]
    Validate(ValidateArgs),

    #[command(about = "List the analysable files of a mirror")]
    Files(FilesArgs),

    #[command(about = "Rank the files of a mirror against a query")]
    Rank(RankArgs),

    #[command(about = "Summarize the structure of a mirror")]
    Summary(SummaryArgs),

    #[command(about = "Synchronize a repository and print the context for a query")]
    Context(ContextArgs),

    #[command(about = "Create a default .rctxignore file")]
    Init(InitArgs),
}

#[derive(Args)]
pub struct RemoteArgs {
    #[arg(help = "Repository URL")]
    pub url: String,

    #[arg(short, long, default_value = "git", help = "Version control kind: git, svn")]
    pub kind: String,

    #[arg(short, long, help = "Project name (default: last URL segment)")]
    pub project: Option<String>,
}

#[derive(Parser)]
pub struct SyncArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    #[arg(short, long, help = "Delete any existing mirror and clone from scratch")]
    pub force: bool,

    #[arg(long, help = "Give up after this many seconds overall")]
    pub deadline: Option<u64>,
}

#[derive(Parser)]
pub struct SyncAllArgs {
    #[arg(help = "TOML manifest with [[repository]] tables")]
    pub manifest: PathBuf,

    #[arg(
        short = 'j',
        long,
        default_value_t = 0,
        help = "Number of parallel jobs (0 = auto)"
    )]
    pub jobs: usize,
}

#[derive(Parser)]
pub struct CleanupArgs {
    #[arg(help = "Project name")]
    pub project: String,
}

#[derive(Parser)]
pub struct StatusArgs {
    #[arg(help = "Project name (default: all mirrors)")]
    pub project: Option<String>,

    #[arg(short, long, default_value = "git", help = "Version control kind: git, svn")]
    pub kind: String,
}

#[derive(Parser)]
pub struct ValidateArgs {
    #[arg(help = "Repository URL")]
    pub url: String,

    #[arg(short, long, default_value = "git", help = "Version control kind: git, svn")]
    pub kind: String,
}

#[derive(Parser)]
pub struct FilesArgs {
    #[arg(help = "Project name")]
    pub project: String,

    #[arg(short, long = "ext", help = "Only these extensions (repeatable)")]
    pub extensions: Vec<String>,

    #[arg(short, long, help = "Flat output instead of tree")]
    pub flat: bool,

    #[arg(long, help = "Disable colors")]
    pub no_color: bool,
}

#[derive(Parser)]
pub struct RankArgs {
    #[arg(help = "Project name")]
    pub project: String,

    #[arg(help = "Natural-language query")]
    pub query: String,

    #[arg(short = 'k', long, help = "Number of files to return")]
    pub top_k: Option<usize>,

    #[arg(long, help = "Maximum number of files to inspect")]
    pub max_candidates: Option<usize>,

    #[arg(short, long = "ext", help = "Only these extensions (repeatable)")]
    pub extensions: Vec<String>,

    #[arg(long, help = "Disable colors")]
    pub no_color: bool,
}

#[derive(Parser)]
pub struct SummaryArgs {
    #[arg(help = "Project name")]
    pub project: String,
}

#[derive(Parser)]
pub struct ContextArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,

    #[arg(short = 'Q', long, help = "Natural-language query")]
    pub query: String,

    #[arg(short = 'n', long, help = "Number of files to include")]
    pub top_k: Option<usize>,

    #[arg(short, long, help = "Show token counts")]
    pub tokens: bool,

    #[arg(long, help = "Give up after this many seconds overall")]
    pub deadline: Option<u64>,
}

#[derive(Parser)]
pub struct InitArgs {
    #[arg(short, long, help = "Create global ~/.rctxignore instead of local")]
    pub global: bool,

    #[arg(short, long, help = "Overwrite existing file")]
    pub force: bool,
}

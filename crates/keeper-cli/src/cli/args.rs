use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "repokeeper",
    version,
    about = "Inventory a user's GitHub repositories and keep local clones synchronized"
)]
pub(super) struct Cli {
    #[command(flatten)]
    pub(super) common: CommonArgs,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(Parser)]
pub(super) struct CommonArgs {
    #[arg(long, global = true, help = "GitHub username owning the repositories")]
    pub(super) user: Option<String>,
    #[arg(
        long,
        global = true,
        help = "GitHub token; falls back to GITHUB_TOKEN in the environment"
    )]
    pub(super) token: Option<String>,
    #[arg(long, global = true, help = "Storage base directory (default ~/repokeeper)")]
    pub(super) root: Option<PathBuf>,
    #[arg(long, global = true, help = "Answer yes to every confirmation")]
    pub(super) yes: bool,
    #[arg(long, global = true, help = "Suppress the progress bar")]
    pub(super) quiet: bool,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Show repository totals and rate-limit counters")]
    Status,
    #[command(about = "List repositories with local state")]
    List,
    #[command(about = "Classify local clones as healthy, broken, or missing")]
    Health,
    #[command(about = "Check SSH reachability, external IP, and API access")]
    Doctor,
    #[command(about = "Run a bulk sync operation")]
    Sync(SyncArgs),
    #[command(about = "Download branches as zip archives")]
    Download(DownloadArgs),
}

#[derive(Parser)]
pub(super) struct SyncArgs {
    #[command(subcommand)]
    pub(super) mode: SyncModeArg,
}

#[derive(clap::Subcommand, Clone, Copy)]
pub(super) enum SyncModeArg {
    #[command(about = "Clone missing and pull existing repositories")]
    All,
    #[command(about = "Pull only repositories reported as needing an update")]
    Needed,
    #[command(about = "Clone repositories with no local copy")]
    Missing,
    #[command(about = "Re-clone broken or missing clones, pull healthy ones")]
    Repair,
    #[command(about = "Delete every local copy and clone it fresh")]
    Reclone,
}

#[derive(Parser)]
pub(super) struct DownloadArgs {
    #[arg(long, help = "Download a single repository by name")]
    pub(super) repo: Option<String>,
    #[arg(long, default_value_t = 0, help = "Worker threads (0 = cores - 1)")]
    pub(super) jobs: usize,
    #[arg(long, default_value_t = 300, help = "Per-repository timeout in seconds")]
    pub(super) timeout_secs: u64,
}

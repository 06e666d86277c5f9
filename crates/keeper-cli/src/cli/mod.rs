mod args;
mod doctor_cmd;
mod repo_cmd;
mod shared;
mod sync_cmd;

use args::{Cli, Commands};
use clap::Parser;

pub(crate) fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Status => repo_cmd::handle_status(&cli.common),
        Commands::List => repo_cmd::handle_list(&cli.common),
        Commands::Health => repo_cmd::handle_health(&cli.common),
        Commands::Doctor => doctor_cmd::handle_doctor(&cli.common),
        Commands::Sync(ref args) => sync_cmd::handle_sync(&cli.common, args),
        Commands::Download(ref args) => sync_cmd::handle_download(&cli.common, args),
    }
}

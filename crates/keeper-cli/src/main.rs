use tracing_subscriber::EnvFilter;

mod cli;
mod progress;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    cli::run()
}

use anyhow::Result;

use cli::{parse_cli, version_banner, CliCommand};

mod cli;
mod config;
mod keyspace;
mod progress;
mod redis_ops;
mod snapshot;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("REDIS_TOOLS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match parse_cli() {
        CliCommand::Version => {
            println!("{}", version_banner());
            Ok(())
        }
        CliCommand::Dump(config) => redis_ops::run_dump(config).await,
        CliCommand::Restore(config) => redis_ops::run_restore(config).await,
    }
}

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod settings;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (cli::Command::Serve(_), false) => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    commands::run_command(cli)
}

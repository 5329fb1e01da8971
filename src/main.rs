// Entry point for the econops command.
// Sets up logging on stderr and hands the parsed flags to the CLI runner.

use std::process::ExitCode;

use clap::Parser;
use econops::cli::{self, Cli};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(cli::log_filter(cli.verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run(&cli)
}

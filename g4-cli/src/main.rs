use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod error;
mod subcommands;
mod workspace;

/// Symbol index for ANTLR4 grammars
#[derive(Parser, Debug)]
#[command(name = "g4idx", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Symbols(subcommands::symbols::Args),
    Refs(subcommands::refs::Args),
    Lens(subcommands::lens::Args),
    Check(subcommands::check::Args),
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Symbols(args) => subcommands::symbols::run(&args),
        Command::Refs(args) => subcommands::refs::run(&args),
        Command::Lens(args) => subcommands::lens::run(&args),
        Command::Check(args) => subcommands::check::run(&args),
    }
}

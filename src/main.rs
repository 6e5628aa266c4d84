//! Parley - serverless peer-to-peer chat over UDP.
//!
//! CLI entry point. The interesting machinery lives in the library; each
//! subcommand is a strategy module under `commands/`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ChatCommand, CommandExecutor, IpCommand, KeygenCommand};

/// Serverless peer-to-peer encrypted chat over UDP.
///
/// Generate an identity with `keygen`, swap profiles with a peer out of band,
/// then run `chat` on both ends.
#[derive(Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Serverless peer-to-peer encrypted chat over UDP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a long-term signing key and a profile file
    Keygen(KeygenCommand),

    /// Run the chat client with an interactive prompt
    Chat(ChatCommand),

    /// Discover this machine's public IP address
    Ip(IpCommand),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Keygen(cmd) => cmd.execute(),
        Commands::Chat(cmd) => cmd.execute(),
        Commands::Ip(cmd) => cmd.execute(),
    }
}

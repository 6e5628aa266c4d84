//! Command module - Strategy pattern for CLI commands.
//!
//! Each subcommand is a separate module implementing the `CommandExecutor`
//! trait, keeping argument parsing and execution logic together.

mod chat;
mod ip;
mod keygen;

pub use chat::ChatCommand;
pub use ip::IpCommand;
pub use keygen::KeygenCommand;

use anyhow::Result;

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements this trait
/// to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self) -> Result<()>;
}

//! cli
//!
//! Command-line interface layer for docsauth.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and apply flag overrides
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, builds a
//! [`Session`] around the [`CredentialLifecycle`](crate::auth::CredentialLifecycle)
//! and renders the lifecycle events the command produces. All credential
//! state changes flow through the lifecycle.

pub mod args;
pub mod commands;
pub mod session;

pub use args::{Cli, Command, Shell};
pub use session::Session;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::ui::output::Verbosity;

/// Everything a command handler needs from the invocation.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration with CLI overrides applied.
    pub config: Config,
    pub verbosity: Verbosity,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    // Completion must work even with a broken config file.
    if let Command::Completion { shell } = cli.command {
        return commands::completion(shell);
    }

    let mut config = Config::load().context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    let ctx = Context { config, verbosity };
    commands::dispatch(cli.command, &ctx).await
}

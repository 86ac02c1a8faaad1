//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens a [`Session`](super::Session) from the invocation's config
//! 2. Drives the credential lifecycle
//! 3. Renders the lifecycle events it produced
//!
//! Handlers never touch the secret store directly.

mod completion;
mod sign_in;
mod sign_out;
mod status;

pub use completion::completion;
pub use sign_in::sign_in;
pub use sign_out::sign_out;
pub use status::status;

use anyhow::Result;

use super::args::Command;
use super::Context;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::SignIn { no_browser, force } => sign_in(ctx, no_browser, force).await,
        Command::SignOut => sign_out(ctx).await,
        Command::Status => status(ctx).await,
        Command::Completion { shell } => completion(shell),
    }
}

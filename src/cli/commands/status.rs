//! cli::commands::status
//!
//! Show the sign-in status for the current environment.
//!
//! # Security
//!
//! Only the user's name and email are shown, never the token.

use anyhow::Result;
use uuid::Uuid;

use crate::cli::session::Session;
use crate::cli::Context;
use crate::environment::ContributorClass;
use crate::ui::output::{self, Verbosity};

/// Run the status command.
pub async fn status(ctx: &Context) -> Result<()> {
    let session = Session::offline(&ctx.config).await?;
    session
        .lifecycle
        .initialize(Uuid::new_v4().to_string())
        .await;
    let credential = session.lifecycle.credential();

    if ctx.verbosity == Verbosity::Quiet {
        // Machine-readable output
        if credential.is_signed_in() {
            println!("signed_in");
        } else {
            println!("signed_out");
        }
        return Ok(());
    }

    let config = &ctx.config;
    println!("{}", output::format_status(&credential));
    println!("  environment:      {}", config.environment());
    println!("  repository host:  {}", config.repo_host_type());
    println!("  user type:        {}", config.contributor_class());
    if let Some(path) = config.loaded_from() {
        output::debug(format!("config: {}", path.display()), ctx.verbosity);
    }

    if config.contributor_class() != ContributorClass::Internal {
        println!("Sign in is only available for internal contributors.");
    } else if !credential.is_signed_in() {
        println!("Run 'docsauth sign-in' to sign in.");
    }
    Ok(())
}

//! cli::commands::sign_out
//!
//! Forget the cached credential for the current environment.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::cli::session::{drive, Session};
use crate::cli::Context;
use crate::events::EventType;

/// Run the sign-out command.
///
/// Signing out when nothing is cached succeeds. If the store cannot be
/// cleared the user is still signed out of this session, but the command
/// fails so scripts notice.
pub async fn sign_out(ctx: &Context) -> Result<()> {
    let session = Session::offline(&ctx.config).await?;
    let mut events = session.bus.subscribe();

    let seen = drive(
        session.lifecycle.sign_out(Uuid::new_v4().to_string()),
        &mut events,
        ctx.verbosity,
    )
    .await;

    if seen
        .iter()
        .any(|event| event.event_type() == EventType::UserSignOutFailed)
    {
        bail!("The stored credential could not be removed.");
    }
    Ok(())
}

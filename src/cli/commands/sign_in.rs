//! cli::commands::sign_in
//!
//! Sign in to the documentation build service.
//!
//! # Design
//!
//! - The cached credential is tried first unless `--force` is given
//! - The browser flow is raced against the configured sign-in timeout
//! - The token is never printed; only the user's name and email are
//!
//! # Example
//!
//! ```bash
//! # Opens the browser
//! docsauth sign-in
//!
//! # Prints the URL to open by hand
//! docsauth sign-in --no-browser
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::cli::session::{drive, Session};
use crate::cli::Context;
use crate::environment::ContributorClass;
use crate::redirect::{RedirectError, SystemBrowser, UrlOpener};
use crate::ui::output;

/// Run the sign-in command.
pub async fn sign_in(ctx: &Context, no_browser: bool, force: bool) -> Result<()> {
    let opener: Arc<dyn UrlOpener> = if no_browser {
        Arc::new(PrintUrl)
    } else {
        Arc::new(SystemBrowser)
    };

    let session = Session::interactive(&ctx.config, opener).await?;
    let mut events = session.bus.subscribe();
    let correlation_id = Uuid::new_v4().to_string();
    output::debug(
        format!(
            "correlation id {}, redirect listener {}",
            correlation_id,
            session.redirect_base().unwrap_or_default()
        ),
        ctx.verbosity,
    );

    let internal = ctx.config.contributor_class() == ContributorClass::Internal;
    if internal && !force {
        drive(
            session.lifecycle.initialize(correlation_id.clone()),
            &mut events,
            ctx.verbosity,
        )
        .await;
        if session.lifecycle.credential().is_signed_in() {
            return Ok(());
        }
    }

    drive(
        session.lifecycle.sign_in(correlation_id),
        &mut events,
        ctx.verbosity,
    )
    .await;

    if session.lifecycle.credential().is_signed_in() {
        Ok(())
    } else {
        bail!("Not signed in.")
    }
}

/// Shows the sign-in URL on stdout instead of opening a browser.
///
/// The URL is printed even in quiet mode; without it the user cannot sign in.
#[derive(Debug, Default, Clone, Copy)]
struct PrintUrl;

impl UrlOpener for PrintUrl {
    fn open(&self, url: &str) -> Result<(), RedirectError> {
        println!("Open this URL in your browser to sign in:");
        println!("  {}", url);
        Ok(())
    }
}


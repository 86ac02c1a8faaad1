//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag. Lifecycle
//! events are turned into [`Notice`]s by [`render_event`] and shown with
//! [`show`]; failures go to stderr, everything else to stdout.
//!
//! # Security
//!
//! Nothing here ever formats a token. Signed-in users are shown by name and
//! email only.

use std::fmt::{self, Display};

use crate::auth::{Credential, SignInStatus};
use crate::events::{BuildResult, Event, ValidationErrorCode};

/// Prefix for messages about sign-in and validation.
pub const MESSAGE_PREFIX: &str = "[Docs Validation]";

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a success message (respects quiet mode).
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// A terminal message derived from a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Progress(String),
    Success(String),
    Failure(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Progress(text) | Notice::Success(text) | Notice::Failure(text) => text,
        }
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Turn an event into the message a user should see, if any.
///
/// Declined and timed-out sign-ins suggest running `docsauth sign-in` again.
/// A failed build whose cause is an expired credential suggests signing in.
pub fn render_event(event: &Event) -> Option<Notice> {
    match event {
        Event::UserSignInProgress { message, .. } => Some(Notice::Progress(message.clone())),
        Event::UserSignInSucceeded {
            credential,
            from_cache,
            ..
        } => {
            let who = describe_user(credential);
            let text = if *from_cache {
                format!("Signed in as {} (cached credential)", who)
            } else {
                format!("Signed in as {}", who)
            };
            Some(Notice::Success(text))
        }
        Event::UserSignInFailed { error, .. } => {
            let mut text = format!("{} Signing in failed: {}", MESSAGE_PREFIX, error);
            if error.offers_retry() {
                text.push_str(" Run 'docsauth sign-in' to try again.");
            }
            Some(Notice::Failure(text))
        }
        Event::UserSignOutSucceeded { .. } => Some(Notice::Success("Signed out".to_string())),
        Event::UserSignOutFailed { error, .. } => Some(Notice::Failure(format!(
            "{} Signing out failed: {}",
            MESSAGE_PREFIX, error
        ))),
        Event::PublicContributorSignIn => Some(Notice::Failure(format!(
            "{} Sign in is only available for internal contributors.",
            MESSAGE_PREFIX
        ))),
        Event::BuildCompleted {
            result: BuildResult::Canceled,
            ..
        } => Some(Notice::Progress("Build canceled".to_string())),
        Event::BuildFailed { error, .. } => {
            let mut text = format!("{} Repository validation failed. {}", MESSAGE_PREFIX, error);
            if error.code == ValidationErrorCode::TriggerBuildWithCredentialExpired {
                text.push_str(" Run 'docsauth sign-in' to sign in again.");
            }
            Some(Notice::Failure(text))
        }
        _ => None,
    }
}

/// Show a notice at the given verbosity. Failures are always shown.
pub fn show(notice: &Notice, verbosity: Verbosity) {
    match notice {
        Notice::Progress(text) => print(text, verbosity),
        Notice::Success(text) => success(text, verbosity),
        Notice::Failure(text) => eprintln!("{}", text),
    }
}

/// Render and show an event; events without a message are skipped.
pub fn show_event(event: &Event, verbosity: Verbosity) {
    if let Some(notice) = render_event(event) {
        show(&notice, verbosity);
    } else {
        debug(format!("event: {:?}", event.event_type()), verbosity);
    }
}

/// One-line status for a credential.
pub fn format_status(credential: &Credential) -> String {
    match credential.status() {
        SignInStatus::SignedIn => format!("Signed in as {}", describe_user(credential)),
        SignInStatus::SignedOut => "Not signed in".to_string(),
    }
}

fn describe_user(credential: &Credential) -> String {
    match credential.user_info() {
        Some(user) if !user.user_email.is_empty() => {
            format!("{} <{}>", user.user_name, user.user_email)
        }
        Some(user) => user.user_name.clone(),
        None => "unknown user".to_string(),
    }
}

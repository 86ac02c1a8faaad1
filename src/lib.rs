//! docsauth - Sign-in credential lifecycle for documentation build validation
//!
//! Internal contributors sign in to the documentation build service through
//! a GitHub or Azure DevOps browser redirect. The resulting credential is
//! cached per environment and repository host, and every change to it is
//! announced on an event bus so that build and language-server components
//! can react.
//!
//! # Architecture
//!
//! - [`auth`] - Credential types, errors, the key chain and the lifecycle
//! - [`events`] - Typed publish/subscribe bus and lifecycle events
//! - [`environment`] - Environment, contributor class and repository host
//! - [`redirect`] - Browser sign-in and redirect delivery
//! - [`secrets`] - Secret storage abstraction
//! - [`core`] - Configuration
//! - [`cli`] - Command-line interface layer
//! - [`ui`] - Terminal output
//!
//! # Correctness Invariants
//!
//! 1. The credential is `SignedIn` exactly when it carries a user
//! 2. Only internal contributors ever load or obtain a credential
//! 3. A failed or timed-out sign-in always leaves the credential `SignedOut`
//! 4. Tokens never appear in logs, errors or terminal output

pub mod auth;
pub mod cli;
pub mod core;
pub mod environment;
pub mod events;
pub mod redirect;
pub mod secrets;
pub mod ui;

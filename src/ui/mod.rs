//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display of lifecycle events
//!
//! # Design
//!
//! All terminal output goes through this module so that the quiet flag is
//! honored in one place and tokens never reach the terminal.

pub mod output;

//! core
//!
//! Process-wide concerns shared by the library and the binary.
//!
//! - [`config`] - configuration schema and loading

pub mod config;

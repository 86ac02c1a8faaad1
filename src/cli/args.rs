//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--env`, `--user-type`, `--repo-host`, `--timeout-ms`: override the
//!   config file for this invocation

use clap::{Parser, Subcommand};

use crate::core::config::Config;
use crate::environment::{ContributorClass, Environment, RepoHostType};

/// docsauth - Sign in to the documentation build service
#[derive(Parser, Debug)]
#[command(name = "docsauth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Build service environment (PROD or PPE)
    #[arg(long, global = true, value_name = "ENV")]
    pub env: Option<Environment>,

    /// Contributor class (internal or external)
    #[arg(long, global = true, value_name = "TYPE")]
    pub user_type: Option<ContributorClass>,

    /// Host of the documentation repository (github or azure-devops)
    #[arg(long, global = true, value_name = "HOST")]
    pub repo_host: Option<RepoHostType>,

    /// How long to wait for the browser redirect, in milliseconds
    #[arg(long, global = true, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Apply flag overrides on top of a loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(env) = self.env {
            config.file.environment = Some(env.to_string());
        }
        if let Some(user_type) = self.user_type {
            config.file.user_type = Some(user_type.to_string());
        }
        if let Some(host) = self.repo_host {
            config.file.repo_host = Some(host.to_string());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config
                .file
                .sign_in
                .get_or_insert_with(Default::default)
                .timeout_ms = Some(timeout_ms);
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in through the repository host's browser flow
    #[command(
        name = "sign-in",
        long_about = "Sign in to the documentation build service.\n\n\
            The cached credential for the current environment is loaded first. \
            If there is none, your browser opens the GitHub or Azure DevOps sign-in \
            page (depending on the repository host) and docsauth waits for the \
            redirect back to a local listener. Only internal contributors sign in.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Sign in (opens browser automatically)
    docsauth sign-in

    # Print the sign-in URL instead of opening a browser
    docsauth sign-in --no-browser

    # Sign in against the PPE environment with an Azure DevOps repository
    docsauth --env PPE --repo-host azure-devops sign-in

HOW IT WORKS:
    1. docsauth starts a listener on 127.0.0.1
    2. Your browser opens the provider's sign-in page
    3. The provider redirects back to the listener with your identity
    4. The credential is cached for the environment and repository host"
    )]
    SignIn {
        /// Print the sign-in URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Sign in again even if a cached credential exists
        #[arg(long)]
        force: bool,
    },

    /// Forget the cached credential
    #[command(
        name = "sign-out",
        long_about = "Sign out of the documentation build service.\n\n\
            Removes the cached credential for the current environment. Signing \
            out when not signed in succeeds.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Sign out
    docsauth sign-out

    # Sign out of PPE
    docsauth --env PPE sign-out"
    )]
    SignOut,

    /// Show whether a credential is cached
    #[command(
        name = "status",
        long_about = "Show the sign-in status for the current environment.\n\n\
            Loads the cached credential without opening a browser. The token \
            itself is never printed.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Check if you're signed in
    docsauth status

    # Check the PPE environment
    docsauth --env PPE status"
    )]
    Status,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for docsauth commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    docsauth completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    docsauth completion zsh >> ~/.zshrc

    # Fish
    docsauth completion fish > ~/.config/fish/completions/docsauth.fish

    # PowerShell
    docsauth completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

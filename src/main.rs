use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use docsauth::cli::{self, Cli};
use docsauth::ui::output;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("fatal: {e:?}");
            output::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr. `RUST_LOG` wins; otherwise `warn`, or `debug` with `--debug`.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

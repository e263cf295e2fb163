pub mod backend;
pub mod cli;
pub mod util;
use std::process::ExitCode;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use crate::util::config::Config;

/// Installs the log subscriber. `RUST_LOG` wins over the default level; `--verbose` wins over both.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Logs go to stderr so command output on stdout stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);

    let result = Config::resolve(cli.data_dir, cli.export_dir)
        .and_then(|config| {
            debug!(data_dir = %config.data_dir.display(), export_dir = %config.export_dir.display(), "resolved configuration");
            cli::execute(cli.command, &config)
        });

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            return ExitCode::SUCCESS;
        },
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }
}

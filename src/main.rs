//! tspipe CLI
//!
//! Usage: tspipe <COMMAND>
//!
//! Commands:
//!   build   Compile every root file for every active target
//!   watch   Compile, then recompile on file changes

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn directive_for_verbosity(verbose: u8, debug: bool) -> &'static str {
    match (verbose, debug) {
        (0, false) => "tspipe=warn",
        (1, false) => "tspipe=info",
        (0..=2, _) => "tspipe=debug",
        _ => "tspipe=trace",
    }
}

fn init_logging(verbose: u8, debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(directive_for_verbosity(verbose, debug))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let ok = match &cli.command {
        Commands::Build(args) => {
            init_logging(cli.verbose, args.debug);
            commands::cmd_build(args, cli.json)?
        }
        Commands::Watch(args) => {
            init_logging(cli.verbose, args.debug);
            commands::cmd_watch(args, cli.json)?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_directive() {
        assert_eq!(directive_for_verbosity(0, false), "tspipe=warn");
        assert_eq!(directive_for_verbosity(1, false), "tspipe=info");
        assert_eq!(directive_for_verbosity(2, false), "tspipe=debug");
        assert_eq!(directive_for_verbosity(0, true), "tspipe=debug");
        assert_eq!(directive_for_verbosity(3, false), "tspipe=trace");
    }
}

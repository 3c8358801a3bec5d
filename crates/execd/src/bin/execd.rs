use std::process::ExitCode;

use clap::Parser;
use execd::{
    bring_up,
    cli::{Cli, Command},
    config::Config,
    logging,
};
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("execd: {e}");
            return ExitCode::FAILURE;
        }
    };
    config.foreground |= cli.foreground;

    logging::init(config.log.level.as_deref(), cli.verbose, cli.quiet, config.log.json);

    if matches!(cli.command, Some(Command::PrintConfig)) {
        println!("{config:#?}");
        return ExitCode::SUCCESS;
    }

    match bring_up::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "execd exiting with a fatal error");
            ExitCode::FAILURE
        }
    }
}

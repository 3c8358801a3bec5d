use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "execd", about = "single-process cluster executive daemon")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "/etc/execd/execd.toml")]
    pub config: PathBuf,

    /// Stay attached to the controlling terminal instead of detaching.
    #[arg(long)]
    pub foreground: bool,

    /// Raise log verbosity; repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Lower log verbosity; repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve and print the effective configuration, then exit without
    /// binding any sockets or touching privileges.
    PrintConfig,
}

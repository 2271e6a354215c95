// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `sitepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitepipe",
    version,
    about = "Build, serve and watch static-site assets.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline config (TOML).
    ///
    /// If omitted, `Sitepipe.toml` in the current directory is used when it
    /// exists, otherwise the built-in default pipeline.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// What to do. Defaults to `dev`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Dev)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Clean, then build every asset with full optimisation.
    Build,
    /// Build, then serve the output and rebuild on changes.
    #[command(alias = "default")]
    Dev,
    /// Run a single task or named graph.
    Run {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Print tasks, graphs and watch rules without running anything.
    Graph,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

//! CLI argument parsing.

use clap::{Parser, Subcommand};

/// Insight analysis server: summaries, answers and charts for tabular data.
#[derive(Parser, Debug)]
#[command(name = "insight-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve {
        /// Override HOST.
        #[arg(long)]
        host: Option<String>,
        /// Override PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the resolved configuration (secrets redacted) and exit.
    CheckConfig,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            host: None,
            port: None,
        })
    }
}

//! Command-line interface definition.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tessera_domain::request::{Header, HttpMethod};

/// Bearer-token API client with automatic token refresh.
#[derive(Debug, Parser)]
#[command(name = "tessera", version, about)]
pub struct Cli {
    /// Settings file (TOML, JSON or YAML); `TESSERA_*` variables override it
    #[arg(short, long, global = true, env = "TESSERA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v warn, -vv info, -vvv debug, -vvvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a token, and optionally the user profile, as the current session
    Login {
        /// Access token
        #[arg(long)]
        token: String,
        /// User profile as a JSON object
        #[arg(long)]
        user: Option<String>,
    },
    /// Forget the current session
    Logout,
    /// Show the current session
    Whoami,
    /// Merge fields into the stored user profile
    Profile {
        /// Top-level fields to set, as a JSON object
        patch: String,
    },
    /// Send an authenticated request
    Send {
        /// HTTP method
        #[arg(short = 'X', long = "request", default_value = "GET")]
        method: HttpMethod,
        /// Absolute URL, or a path under the configured base URL
        target: String,
        /// Extra header, as 'Name: value'
        #[arg(short = 'H', long = "header")]
        headers: Vec<Header>,
        /// Request body; sent as JSON when it parses as JSON
        #[arg(short = 'd', long = "data")]
        data: Option<String>,
    },
}

impl Cli {
    /// Log filter for the chosen verbosity, used when `RUST_LOG` is unset.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
    }
}

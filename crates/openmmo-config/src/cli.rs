//! Command-line argument parsing for the OpenMMO client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// OpenMMO client command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "openmmo-client", about = "Headless OpenMMO client")]
pub struct CliArgs {
    /// Server address.
    #[arg(long)]
    pub server: Option<String>,

    /// Server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Snap to authoritative positions instead of blending.
    #[arg(long)]
    pub trust_server: Option<bool>,

    /// Account name to log in with.
    #[arg(long)]
    pub username: Option<String>,

    /// Pre-hashed password sent with the login request.
    #[arg(long)]
    pub password: Option<String>,

    /// Select the first character returned by the server.
    #[arg(long, default_value_t = false)]
    pub auto_select: bool,

    /// Stop after this many seconds (runs until interrupted when absent).
    #[arg(long)]
    pub run_secs: Option<u64>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.server {
            self.network.server_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(trust) = args.trust_server {
            self.reconciliation.trust_server = trust;
        }
    }
}

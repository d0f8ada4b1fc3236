//! Command-line interface for the companion server.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Address the HTTP server listens on.
    pub listen_addr: String,
    /// Path to the JSON configuration file.
    pub config_path: PathBuf,
    /// Enable verbose (debug) logging.
    pub verbose: bool,
    /// Open the system browser once the server accepts connections.
    pub open_browser: bool,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    pub fn parse() -> Self {
        let matches = Command::new("gamedock")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Local companion server for a browser-based game")
            .arg(
                Arg::new("listen-addr")
                    .short('l')
                    .long("listen-addr")
                    .value_name("ADDRESS")
                    .help("Address to listen on")
                    .default_value("127.0.0.1:19384"),
            )
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("gamedock.json"),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Enable verbose logging")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("open-browser")
                    .long("open-browser")
                    .help("Open the browser once the server is up")
                    .action(ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            listen_addr: matches
                .get_one::<String>("listen-addr")
                .expect("default listen address is set")
                .clone(),
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .expect("default config path is set"),
            ),
            verbose: matches.get_flag("verbose"),
            open_browser: matches.get_flag("open-browser"),
        }
    }
}

//! Command-line interface handling for the headless editor.
//!
//! This module provides command-line argument parsing using the `clap`
//! builder API. Every option overrides the matching configuration file
//! setting.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "pcv-editor.toml";

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Session identifier to mirror
    pub uid: Option<String>,
    /// Optional override for the REST base URL
    pub api_url: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Whether to request the codes collection right after startup
    pub load_codes: bool,
}

/// Builds the clap command describing every option.
pub fn command() -> Command {
    Command::new("PCV Editor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Headless Playcore editor session mirroring one uid")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("uid")
                .short('u')
                .long("uid")
                .value_name("UID")
                .help("Session identifier to open"),
        )
        .arg(
            Arg::new("api-url")
                .short('a')
                .long("api-url")
                .value_name("URL")
                .help("REST base URL (e.g., https://portal.example.com/api)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("load-codes")
                .long("load-codes")
                .help("Load redemption codes on startup")
                .action(clap::ArgAction::SetTrue),
        )
}

impl CliArgs {
    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            uid: matches.get_one::<String>("uid").cloned(),
            api_url: matches.get_one::<String>("api-url").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            load_codes: matches.get_flag("load-codes"),
        }
    }
}

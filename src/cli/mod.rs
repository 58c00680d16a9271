use crate::config::{
    ConnectionConfig, DumpConfig, RestoreConfig, DEFAULT_HOST, DEFAULT_OUTPUT_FILE,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::{ffi::OsString, path::PathBuf};

pub const DUMP: &str = "dump";
pub const RESTORE: &str = "restore";

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Dump(DumpConfig),
    Restore(RestoreConfig),
    Version,
}

/// Version banner printed for `--version`.
pub fn version_banner() -> String {
    format!(
        "{:<14} {}\n{:<14} {}\n{:<14} {}",
        "Version",
        VERSION,
        "Git Version",
        option_env!("GIT_COMMIT").unwrap_or(""),
        "Rust Version",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    )
}

fn connection_args() -> [Arg; 3] {
    [
        Arg::new("host")
            .long("host")
            .value_name("HOST")
            .help("Server hostname")
            .default_value(DEFAULT_HOST),
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .help("Server port")
            .value_parser(value_parser!(u16))
            .default_value("6379"),
        Arg::new("password")
            .long("password")
            .value_name("PASSWORD")
            .help("Password to use when connecting to the server"),
    ]
}

fn common_flags() -> [Arg; 2] {
    [
        Arg::new("silent")
            .short('s')
            .long("silent")
            .help("Silent mode")
            .action(ArgAction::SetTrue),
        Arg::new("version")
            .short('v')
            .long("version")
            .help("Print version information")
            .action(ArgAction::SetTrue),
    ]
}

pub fn new() -> Command {
    Command::new("redis-tools")
        .about("Export a running server into a JSON snapshot and restore it")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new(DUMP)
                .about("Export the content of a running server into a .json file")
                .args(connection_args())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_name("FILE")
                        .help("Output file")
                        .default_value(DEFAULT_OUTPUT_FILE),
                )
                .args(common_flags()),
        )
        .subcommand(
            Command::new(RESTORE)
                .about("Restore a snapshot generated by dump to a running server")
                .arg(
                    Arg::new("filename")
                        .value_name("FILENAME")
                        .help("Snapshot file to restore")
                        .required_unless_present("version"),
                )
                .args(connection_args())
                .args(common_flags()),
        )
}

fn connection_config(m: &ArgMatches) -> ConnectionConfig {
    ConnectionConfig {
        host: m
            .get_one::<String>("host")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: m
            .get_one::<u16>("port")
            .copied()
            .unwrap_or(ConnectionConfig::default().port),
        password: m.get_one::<String>("password").cloned(),
    }
}

fn path_arg(m: &ArgMatches, name: &str) -> PathBuf {
    m.get_one::<String>(name).map(PathBuf::from).unwrap_or_default()
}

pub fn command_from_matches(m: &ArgMatches) -> CliCommand {
    match m.subcommand() {
        Some((_, sm)) if sm.get_flag("version") => CliCommand::Version,
        Some((RESTORE, sm)) => CliCommand::Restore(RestoreConfig {
            connection: connection_config(sm),
            input_file: path_arg(sm, "filename"),
            silent: sm.get_flag("silent"),
        }),
        Some((_, sm)) => CliCommand::Dump(DumpConfig {
            connection: connection_config(sm),
            output_file: path_arg(sm, "out"),
            silent: sm.get_flag("silent"),
        }),
        None => CliCommand::Version,
    }
}

pub fn try_parse_from<I, T>(args: I) -> Result<CliCommand, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = new().try_get_matches_from(args)?;
    Ok(command_from_matches(&matches))
}

/// Parses the process arguments, exiting with a usage message on error.
pub fn parse_cli() -> CliCommand {
    try_parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
}

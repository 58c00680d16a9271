use std::{path::PathBuf, time::Duration};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_OUTPUT_FILE: &str = "redis.json";

/// Connect and response timeout shared by every call on the connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Keys are always enumerated with the wildcard pattern.
pub const SCAN_PATTERN: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DumpConfig {
    pub connection: ConnectionConfig,
    pub output_file: PathBuf,
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreConfig {
    pub connection: ConnectionConfig,
    pub input_file: PathBuf,
    pub silent: bool,
}

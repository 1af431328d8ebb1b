use std::{path::PathBuf, time::Duration};

use clap::Parser;
use config::{ConfigError, Environment, File, FileFormat};

use crate::{
    http::codec::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEAD_BYTES},
    server::{DEFAULT_MAX_CONNECTIONS, DEFAULT_TIMEOUT},
};

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:4221";

/// A tiny HTTP/1.1 server
#[derive(Debug, Default, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Directory the `/files/` routes read from and write to
    #[arg(long)]
    pub directory: Option<PathBuf>,
    /// Address to listen on
    #[arg(long)]
    pub address: Option<String>,
    /// Optional TOML configuration file
    #[arg(long, default_value = "httpd.toml")]
    pub config: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    pub address: String,
    pub directory: PathBuf,
    pub max_head_bytes: usize,
    pub max_body_bytes: usize,
    pub timeout_secs: u64,
    pub max_connections: usize,
}

impl Config {
    /// Layers defaults, the config file, `HTTPD_*` variables and flags, in
    /// increasing precedence.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let file = args.config.to_string_lossy();
        let directory = args
            .directory
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned());

        ::config::Config::builder()
            .set_default("address", DEFAULT_ADDRESS)?
            .set_default("directory", ".")?
            .set_default("max_head_bytes", DEFAULT_MAX_HEAD_BYTES as i64)?
            .set_default("max_body_bytes", DEFAULT_MAX_BODY_BYTES as i64)?
            .set_default("timeout_secs", DEFAULT_TIMEOUT.as_secs() as i64)?
            .set_default("max_connections", DEFAULT_MAX_CONNECTIONS as i64)?
            .add_source(File::new(&file, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("HTTPD").try_parsing(true))
            .set_override_option("address", args.address.clone())?
            .set_override_option("directory", directory)?
            .build()?
            .try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

//! Server configuration.
//!
//! Layered lowest to highest: built-in defaults, the TOML config file,
//! `WEBCAL_PROXY__SECTION__KEY` environment variables, then CLI flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use webcal_proxy_core::fetch::FetchConfig;

use crate::Cli;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Log to this file instead of stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("logging.level", "info")?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => match Self::config_path() {
                Some(path) => builder.add_source(File::from(path).required(false)),
                None => builder,
            },
        };

        let settings = builder
            .add_source(
                Environment::with_prefix("WEBCAL_PROXY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.addr", cli.addr.clone())?
            .set_override_option("logging.level", cli.log_level.clone())?
            .set_override_option(
                "logging.file",
                cli.log_file.as_ref().map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option("fetch.max_conns", cli.max_conns.map(|n| n as i64))?
            .set_override_option("fetch.timeout_secs", cli.timeout.map(|n| n as i64))?
            .set_override_option("fetch.allow_loopback", cli.allow_loopback.then_some(true))?
            .build()
            .context("Failed to read configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;

        Ok(settings)
    }

    /// `<config dir>/webcal-proxy/config.toml`, e.g. ~/.config on Linux.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("webcal-proxy").join("config.toml"))
    }
}

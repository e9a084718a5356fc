//! Runtime settings.
//!
//! Read from `settings.toml` (optional, `--config` picks another file) and
//! from `INVOICER__*` environment variables, e.g. `INVOICER__SERVER__PORT`.

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Parser)]
#[command(name = "invoicer", about = "Invoice manager API server")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
    pub database: Database,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            database: Database::Sqlite("./invoicer.db".to_string()),
        }
    }
}

/// Exchange-rate source settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Fx {
    /// Base URL of the rate API; requests go to `{base_url}/latest`.
    pub base_url: String,
    pub timeout_secs: u64,
    /// Cache lifetime of rates used for item conversions.
    pub conversion_ttl_secs: u64,
    /// Cache lifetime of rates served by `GET /fx/rate`.
    pub lookup_ttl_secs: u64,
}

impl Default for Fx {
    fn default() -> Self {
        Self {
            base_url: "https://api.frankfurter.app".to_string(),
            timeout_secs: engine::DEFAULT_FETCH_TIMEOUT.as_secs(),
            conversion_ttl_secs: engine::CONVERSION_CACHE_TTL.as_secs(),
            lookup_ttl_secs: engine::LOOKUP_CACHE_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub fx: Fx,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();
        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("INVOICER").separator("__"))
            .build()?
            .try_deserialize()
    }
}

//! Settings for the application, read from `settings.toml` with
//! `STOCKROOM__SECTION__KEY` environment overrides.
//!
//! See `settings.toml` for the configuration.
use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Default, Deserialize)]
pub struct Engine {
    pub broadcast_capacity: Option<usize>,
    #[serde(default)]
    pub require_funds: bool,
    pub cas_retries: Option<u32>,
}

/// An identity known to the external auth service.
#[derive(Debug, Deserialize)]
pub struct ActorSeed {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub engine: Engine,
    /// `MUTATION_KIND = ["role", ...]`, on top of admin authority.
    #[serde(default)]
    pub authority: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub actors: Vec<ActorSeed>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings"))
            .add_source(Environment::with_prefix("STOCKROOM").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

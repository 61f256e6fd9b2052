use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub base_url: String,
    pub actor_id: Option<Uuid>,
    /// Backstop refresh, independent of change events.
    pub refresh_interval_secs: u64,
    pub reconnect_delay_ms: u64,
    pub level: String,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/".to_string(),
            actor_id: None,
            refresh_interval_secs: 30,
            reconnect_delay_ms: 2000,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct File {
    #[serde(default)]
    console: ConsoleSettings,
}

impl ConsoleSettings {
    /// Read the `[console]` table of `path` (optional), then
    /// `STOCKROOM__CONSOLE__*` overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file: File = config::Config::builder()
            .add_source(config::File::with_name(path.unwrap_or(DEFAULT_CONFIG_PATH)).required(false))
            .add_source(config::Environment::with_prefix("STOCKROOM").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(file.console)
    }
}

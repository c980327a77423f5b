

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::error::{Result, TeamspaceError};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    Helix,
    Memory,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamspaceConfig {
    
    pub host: String,
    pub port: u16,
    pub instance: String,
    pub timeout: u64,
    pub max_retries: u32,

    
    pub backend: StoreBackend,

    
    pub step_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    /// Re-plan and execute once more when the post-run check finds work left.
    pub race_replan: bool,
}

impl TeamspaceConfig {
    
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            instance: "dev".to_string(),
            timeout: 30,
            max_retries: 3,

            backend: StoreBackend::Helix,

            step_max_attempts: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 5000,

            race_replan: true,
        }
    }

    
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    
    pub fn from_env() -> Self {
        let mut config = Self::new(
            &std::env::var("TEAMSPACE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            std::env::var("TEAMSPACE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(crate::DEFAULT_HELIX_PORT),
        );

        if let Ok(instance) = std::env::var("TEAMSPACE_INSTANCE") {
            config.instance = instance;
        }
        if let Some(backend) = std::env::var("TEAMSPACE_BACKEND")
            .ok()
            .and_then(|b| b.parse().ok())
        {
            config.backend = backend;
        }
        if let Some(attempts) = std::env::var("TEAMSPACE_STEP_MAX_ATTEMPTS")
            .ok()
            .and_then(|a| a.parse().ok())
        {
            config.step_max_attempts = attempts;
        }
        if let Ok(replan) = std::env::var("TEAMSPACE_RACE_REPLAN") {
            config.race_replan = !matches!(replan.as_str(), "0" | "false" | "no");
        }

        config
    }

    /// Layers an optional config file under `TEAMSPACE__*` environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("TEAMSPACE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| TeamspaceError::Config(e.to_string()))?;

        settings
            .try_deserialize::<TeamspaceConfig>()
            .map_err(|e| TeamspaceError::Config(e.to_string()))
    }
}

impl Default for TeamspaceConfig {
    fn default() -> Self {
        Self::new("localhost", crate::DEFAULT_HELIX_PORT)
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub listen: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    pub token_ttl_hours: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Rewards {
    pub welcome_bonus: i64,
    pub booster_cooldown_minutes: i64,
}

impl Default for Rewards {
    fn default() -> Self {
        Rewards {
            welcome_bonus: 10_000,
            booster_cooldown_minutes: 120,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub postgres: Postgres,
    pub auth: Auth,
    #[serde(default)]
    pub rewards: Rewards,
}

fn default_max_connections() -> u32 {
    5
}

impl Settings {
    /// Loads `path` and overlays `APP__SECTION__KEY` environment variables.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

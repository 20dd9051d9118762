use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::File;

use crate::Error;

/// Global config object
pub static CONFIG: Lazy<Config> = Lazy::new(|| Config::load().expect("Failed to load config"));

#[derive(Serialize, Deserialize, Default)]
pub struct DiscordAuth {
    pub token: String,
}

#[derive(Serialize, Deserialize, Default)]
pub struct Meta {
    pub postgres_url: String,
    /// Whether ban enforcement is wired up. When false, freeloader
    /// reports can still be built but bans cannot be executed.
    #[serde(default = "default_true")]
    pub ban_manager_enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize)]
pub struct Config {
    pub discord_auth: DiscordAuth,
    pub meta: Meta,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        let file = File::open("config.yaml");

        match file {
            Ok(file) => {
                let cfg: Config = serde_yaml::from_reader(file)?;

                Ok(cfg)
            }
            Err(e) => {
                // Print error
                println!("config.yaml could not be loaded: {}", e);

                // Exit
                std::process::exit(1);
            }
        }
    }
}

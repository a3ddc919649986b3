//! Launch options from the command line and environment.
//!
//! Supported:
//!   --token <JWT> | --token=<JWT>             (or STDB_TOKEN / STDB_JWT)
//!   --token-file <path> | --token-file=<path>
//!   --config <path> | --config=<path>         (or DRIVE_CONFIG), JSON overrides of the game config
//!   --name <username> | --name=<username>
//!   --offline                                  single player against an in-process room

use bevy::prelude::*;
use shared::GameConfig;

#[derive(Resource, Debug, Clone, Default)]
pub struct LaunchOptions {
    pub token: Option<String>,
    pub username: Option<String>,
    pub offline: bool,
    pub config: GameConfig,
}

impl LaunchOptions {
    pub fn from_env() -> Self {
        let mut options = Self::parse(std::env::args().skip(1));

        if options.token.is_none() {
            options.token = std::env::var("STDB_TOKEN")
                .or_else(|_| std::env::var("STDB_JWT"))
                .ok();
        }
        options
    }

    fn parse(args: impl Iterator<Item = String>) -> Self {
        let mut options = Self::default();
        let mut config_path = std::env::var("DRIVE_CONFIG").ok();
        let mut pending_key: Option<&'static str> = None;

        for arg in args {
            if let Some(key) = pending_key.take() {
                match key {
                    "token" => options.token = Some(arg),
                    "token-file" => options.token = read_token_file(&arg),
                    "config" => config_path = Some(arg),
                    "name" => options.username = Some(arg),
                    _ => {}
                }
                continue;
            }

            match arg.as_str() {
                "--offline" => options.offline = true,
                "--token" | "-t" => pending_key = Some("token"),
                "--token-file" => pending_key = Some("token-file"),
                "--config" => pending_key = Some("config"),
                "--name" => pending_key = Some("name"),
                _ => {
                    if let Some(val) = arg.strip_prefix("--token=") {
                        options.token = Some(val.to_string());
                    } else if let Some(path) = arg.strip_prefix("--token-file=") {
                        options.token = read_token_file(path);
                    } else if let Some(path) = arg.strip_prefix("--config=") {
                        config_path = Some(path.to_string());
                    } else if let Some(name) = arg.strip_prefix("--name=") {
                        options.username = Some(name.to_string());
                    } else {
                        warn!("Ignoring unknown argument {arg:?}");
                    }
                }
            }
        }

        if let Some(path) = config_path {
            options.config = load_config(&path);
        }
        options
    }
}

fn read_token_file(path: &str) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

/// Falls back to the defaults when the file is missing or invalid.
fn load_config(path: &str) -> GameConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("Could not read config {path}: {err}; using defaults.");
            return GameConfig::default();
        }
    };
    match GameConfig::from_json_str(&text) {
        Ok(cfg) => {
            info!("Loaded game config from {path}.");
            cfg
        }
        Err(err) => {
            warn!("Invalid config {path}: {err}; using defaults.");
            GameConfig::default()
        }
    }
}

use anyhow::Result;
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_history_window() -> usize {
    14
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(proj_dirs) = ProjectDirs::from("com", "confab", "confab") {
            let config_path = proj_dirs.config_dir().join("config.toml");

            if config_path.exists() {
                let contents = fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            default_model: default_model(),
            history_window: default_history_window(),
        }
    }
}

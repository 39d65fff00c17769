use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::DEFAULT_BASE_URL;
use crate::error::{Error, Result};
use crate::state::ConversationState;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub user_name: Option<String>,
    pub greeting: Option<String>,
    /// Extra headers sent with every chat request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Replaces the built-in first-turn conversation state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<ConversationState>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Write to the default location and return where it went.
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// First system message shown in the chat log.
    pub fn greeting(&self) -> String {
        if let Some(greeting) = &self.greeting {
            return greeting.clone();
        }
        match self.user_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => format!("Good Evening {}. How may I assist you?", name),
            None => "Good Evening. How may I assist you?".to_string(),
        }
    }

    pub fn initial_state(&self) -> ConversationState {
        self.initial_state.clone().unwrap_or_default()
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("doctor-saab").join("config.json"))
    }
}

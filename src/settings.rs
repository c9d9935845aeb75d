use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// Environment variable that overrides the stored server address
const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

pub const SETTINGS_FILE_NAME: &str = "settings.json";
const SETTINGS_DIR_NAME: &str = "ollama-chat";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatSettings {
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,
    #[serde(default = "default_model")]
    pub selected_model: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_show_metrics")]
    pub show_metrics: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            ollama_host: default_ollama_host(),
            selected_model: default_model(),
            connect_timeout_secs: default_connect_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            show_metrics: default_show_metrics(),
        }
    }
}

fn default_ollama_host() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_model() -> String {
    "".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_show_metrics() -> bool {
    true
}

/// `<config dir>/ollama-chat/settings.json`, when the platform has one.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
}

/// Read settings from `path`, writing defaults when the file is missing or
/// can't be parsed.
pub fn load_or_create_settings(path: &Path) -> Result<ChatSettings> {
    if !path.exists() {
        debug!("No settings at {}, writing defaults", path.display());
        let settings = ChatSettings::default();
        write_settings(path, &settings)?;
        return Ok(settings);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    match serde_json::from_str::<ChatSettings>(&raw) {
        Ok(settings) => {
            debug!("Found existing settings: {:?}", settings);
            Ok(settings)
        }
        Err(e) => {
            warn!(
                "Failed to parse settings at {}: {}. Falling back to defaults",
                path.display(),
                e
            );
            let settings = ChatSettings::default();
            write_settings(path, &settings)?;
            Ok(settings)
        }
    }
}

pub fn write_settings(path: &Path, settings: &ChatSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings).context("Failed to encode settings")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Get the effective server address.
/// `OLLAMA_HOST` wins over the stored value when set and non-blank.
/// This is called fresh on each invocation to pick up runtime changes.
pub fn get_effective_host(settings: &ChatSettings) -> String {
    if let Ok(env_host) = env::var(OLLAMA_HOST_ENV) {
        if !env_host.trim().is_empty() {
            debug!(
                "Using host from environment variable {}: {}",
                OLLAMA_HOST_ENV,
                env_host.trim()
            );
            return normalize_host(&env_host);
        }
    }
    normalize_host(&settings.ollama_host)
}

/// Add a scheme when missing and drop trailing slashes.
pub fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.dbchat/config.json`) and environment.
//! Every field is optional; a missing file means defaults.

use crate::api::DEFAULT_BASE_URL;
use crate::models::ModelType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// REST service settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Chat defaults (e.g. model preselected in the selector).
    #[serde(default)]
    pub chat: ChatConfig,

    /// Where the signed-in user and token are kept.
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL of the service. Overridden by DBCHAT_API_URL env.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Wire name of the model, e.g. "gemini" or "sqlCoder".
    pub default_model: Option<ModelType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Session file. Relative paths are resolved against the config file's parent.
    pub path: Option<PathBuf>,
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DBCHAT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".dbchat").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, else the default path (or DBCHAT_CONFIG_PATH).
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn pick_base_url(env: Option<&str>, config: &Config) -> String {
    let url = non_blank(env)
        .or_else(|| non_blank(config.api.base_url.as_deref()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    url.trim_end_matches('/').to_string()
}

/// Resolve the service URL: env DBCHAT_API_URL overrides config.
pub fn resolve_api_base_url(config: &Config) -> String {
    let env = std::env::var("DBCHAT_API_URL").ok();
    pick_base_url(env.as_deref(), config)
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Session file: `session.path` if set, otherwise `session.json` next to the config file.
pub fn resolve_session_path(config: &Config, config_path: &Path) -> PathBuf {
    let dir = config_dir(config_path);
    match &config.session.path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                dir.join(p)
            }
        }
        _ => dir.join("session.json"),
    }
}

pub fn resolve_default_model(config: &Config) -> ModelType {
    config.chat.default_model.unwrap_or_default()
}

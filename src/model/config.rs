use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub host: HostConfig,
    pub panel: PanelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    pub delete_confirm_ms: u64,
    pub toast_ttl_ms: u64,
    pub max_toasts: usize,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let user_path = directories::ProjectDirs::from("", "", "repo-panel")
            .map(|dirs| dirs.config_dir().join("config.toml"));
        Self::load_layered(user_path.as_deref())
    }

    /// Parse the embedded defaults and deep-merge `user_path` over them when it exists.
    pub fn load_layered(user_path: Option<&Path>) -> Result<Self> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS)?;

        if let Some(path) = user_path
            && path.exists()
        {
            let user: toml::Table = toml::from_str(&fs::read_to_string(path)?)?;
            merge_tables(&mut merged, user);
            tracing::info!("loaded user config from {}", path.display());
        }

        let mut config: AppConfig = toml::Value::Table(merged).try_into()?;
        config.host.program = expand_tilde(&config.host.program)
            .to_string_lossy()
            .into_owned();

        Ok(config)
    }
}

impl PanelConfig {
    pub fn delete_confirm_window(&self) -> Duration {
        Duration::from_millis(self.delete_confirm_ms)
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }
}

/// Tables merge key by key; any other value in `overlay` replaces the base value.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let overlay_table = match value {
            toml::Value::Table(table) => table,
            other => {
                base.insert(key, other);
                continue;
            }
        };

        if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
            merge_tables(base_table, overlay_table);
            continue;
        }

        base.insert(key, toml::Value::Table(overlay_table));
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if !path.starts_with('~') {
        return PathBuf::from(path);
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        let home = base_dirs.home_dir().to_string_lossy();
        return PathBuf::from(path.replacen('~', &home, 1));
    }

    PathBuf::from(path)
}

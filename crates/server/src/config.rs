use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use ism_server_api::ClusterCredentials;
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub cluster_url: String,
    pub cluster_username: Option<String>,
    pub cluster_password: Option<String>,
    pub request_timeout_seconds: u64,
    /// When false the policy routes are not mounted.
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5601".into(),
            cluster_url: "http://localhost:9200".into(),
            cluster_username: None,
            cluster_password: None,
            request_timeout_seconds: 30,
            enabled: true,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }

    pub fn credentials(&self) -> Option<ClusterCredentials> {
        let username = self.cluster_username.clone()?;
        Some(ClusterCredentials {
            username,
            password: self.cluster_password.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    cluster_url: Option<String>,
    cluster_username: Option<String>,
    cluster_password: Option<String>,
    request_timeout_seconds: Option<u64>,
    enabled: Option<bool>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let file = read_settings_file(Path::new(SETTINGS_FILE))?;
    Ok(resolve_settings(file.as_deref(), |key| std::env::var(key).ok()))
}

fn read_settings_file(path: &Path) -> anyhow::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))
}

/// Defaults, then the settings file, then environment overrides. For every key the
/// `APP__` variable wins over the short `ISM_` one.
pub fn resolve_settings(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.bind_addr {
                    settings.server_bind = v;
                }
                if let Some(v) = file_cfg.cluster_url {
                    settings.cluster_url = v;
                }
                if let Some(v) = file_cfg.cluster_username {
                    settings.cluster_username = Some(v);
                }
                if let Some(v) = file_cfg.cluster_password {
                    settings.cluster_password = Some(v);
                }
                if let Some(v) = file_cfg.request_timeout_seconds {
                    settings.request_timeout_seconds = v;
                }
                if let Some(v) = file_cfg.enabled {
                    settings.enabled = v;
                }
            }
            Err(error) => {
                tracing::warn!(%error, file = SETTINGS_FILE, "ignoring unparseable settings file");
            }
        }
    }

    let lookup = |short: &str, long: &str| env(long).or_else(|| env(short));

    if let Some(v) = lookup("ISM_BIND", "APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("ISM_CLUSTER_URL", "APP__CLUSTER_URL") {
        settings.cluster_url = v;
    }
    if let Some(v) = lookup("ISM_CLUSTER_USERNAME", "APP__CLUSTER_USERNAME") {
        settings.cluster_username = Some(v);
    }
    if let Some(v) = lookup("ISM_CLUSTER_PASSWORD", "APP__CLUSTER_PASSWORD") {
        settings.cluster_password = Some(v);
    }
    if let Some(v) = lookup("ISM_REQUEST_TIMEOUT_SECONDS", "APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }
    if let Some(v) = lookup("ISM_ENABLED", "APP__ENABLED") {
        if let Some(parsed) = parse_flag(&v) {
            settings.enabled = parsed;
        }
    }

    settings
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub downloads_dir: Option<String>,
    pub sources_dir: Option<String>,
    pub task_manager_url: Option<String>,
    pub task_manager_timeout_sec: Option<u64>,
    pub metrics_port: Option<u16>,

    // Feature configs
    pub download_jobs: Option<DownloadJobsConfig>,
    pub notifications: Option<NotificationsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DownloadJobsConfig {
    pub default_ttl_ms: Option<i64>,
    pub generation_priority: Option<i32>,
    pub sweep_interval_secs: Option<u64>,
    pub status_refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct NotificationsConfig {
    pub sender: Option<String>,
    /// HTTP endpoint accepting `{from, to, subject, body}`; mail is only logged without it
    pub mail_relay_url: Option<String>,
    pub download_base_url: Option<String>,
    pub ready_subject: Option<String>,
    pub ready_body: Option<String>,
    pub error_subject: Option<String>,
    pub error_body: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

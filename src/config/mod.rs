mod file_config;

pub use file_config::{DownloadJobsConfig, FileConfig, NotificationsConfig};

use crate::download_jobs::DownloadJobSettings;
use crate::notifications::{NotificationSettings, NotificationTemplates};
use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub downloads_dir: Option<PathBuf>,
    pub sources_dir: Option<PathBuf>,
    pub task_manager_url: Option<String>,
    pub task_manager_timeout_sec: u64,
    pub metrics_port: u16,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub sources_dir: PathBuf,
    pub task_manager_url: String,
    pub task_manager_timeout_sec: u64,
    /// 0 disables the metrics endpoint.
    pub metrics_port: u16,
    pub mail_relay_url: Option<String>,

    // Feature configs (with defaults)
    pub download_jobs: DownloadJobSettings,
    pub notifications: NotificationSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let downloads_dir = file
            .downloads_dir
            .map(PathBuf::from)
            .or_else(|| cli.downloads_dir.clone())
            .unwrap_or_else(|| db_dir.join("downloads"));
        let sources_dir = file
            .sources_dir
            .map(PathBuf::from)
            .or_else(|| cli.sources_dir.clone())
            .unwrap_or_else(|| db_dir.join("sources"));

        let task_manager_url = file
            .task_manager_url
            .or_else(|| cli.task_manager_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "task_manager_url must be specified via --task-manager-url or in config file"
                )
            })?;
        let task_manager_timeout_sec = file
            .task_manager_timeout_sec
            .unwrap_or(cli.task_manager_timeout_sec);
        if task_manager_timeout_sec == 0 {
            bail!("task_manager_timeout_sec must be positive");
        }
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        // Download job settings - merge file config with defaults
        let dj_file = file.download_jobs.unwrap_or_default();
        let dj_defaults = DownloadJobSettings::default();
        let download_jobs = DownloadJobSettings {
            default_ttl_ms: dj_file.default_ttl_ms.unwrap_or(dj_defaults.default_ttl_ms),
            generation_priority: dj_file
                .generation_priority
                .unwrap_or(dj_defaults.generation_priority),
            sweep_interval_secs: dj_file
                .sweep_interval_secs
                .unwrap_or(dj_defaults.sweep_interval_secs),
            status_refresh_interval_secs: dj_file
                .status_refresh_interval_secs
                .unwrap_or(dj_defaults.status_refresh_interval_secs),
        };
        if download_jobs.default_ttl_ms <= 0 {
            bail!("download_jobs.default_ttl_ms must be positive");
        }
        if download_jobs.sweep_interval_secs == 0 || download_jobs.status_refresh_interval_secs == 0
        {
            bail!("download_jobs intervals must be positive");
        }

        // Notification settings
        let n_file = file.notifications.unwrap_or_default();
        let n_defaults = NotificationSettings::default();
        let templates = NotificationTemplates {
            ready_subject: n_file
                .ready_subject
                .unwrap_or(n_defaults.templates.ready_subject),
            ready_body: n_file.ready_body.unwrap_or(n_defaults.templates.ready_body),
            error_subject: n_file
                .error_subject
                .unwrap_or(n_defaults.templates.error_subject),
            error_body: n_file.error_body.unwrap_or(n_defaults.templates.error_body),
        };
        let notifications = NotificationSettings {
            sender: n_file.sender.unwrap_or(n_defaults.sender),
            download_base_url: n_file.download_base_url,
            templates,
        };

        Ok(Self {
            db_dir,
            downloads_dir,
            sources_dir,
            task_manager_url,
            task_manager_timeout_sec,
            metrics_port,
            mail_relay_url: n_file.mail_relay_url,
            download_jobs,
            notifications,
        })
    }

    pub fn download_jobs_db_path(&self) -> PathBuf {
        self.db_dir.join("download_jobs.db")
    }
}

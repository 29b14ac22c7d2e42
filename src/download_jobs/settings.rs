/// Fourteen days.
pub const DEFAULT_TTL_MS: i64 = 14 * 24 * 60 * 60 * 1000;

/// Tunables of the download job lifecycle, read from the `[download_jobs]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJobSettings {
    /// TTL applied when a request carries none.
    pub default_ttl_ms: i64,
    /// Priority sent to the task manager with every submission.
    pub generation_priority: i32,
    pub sweep_interval_secs: u64,
    pub status_refresh_interval_secs: u64,
}

impl Default for DownloadJobSettings {
    fn default() -> Self {
        Self {
            default_ttl_ms: DEFAULT_TTL_MS,
            generation_priority: 5,
            sweep_interval_secs: 3600,
            status_refresh_interval_secs: 60,
        }
    }
}

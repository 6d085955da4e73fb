use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Upper bound for `max_concurrent_downloads`.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 10;
/// Upper bound for `transcode_workers`.
pub const MAX_TRANSCODE_WORKERS: usize = 4;

/// Environment variable that overrides `[telegram].bot_token`.
pub const BOT_TOKEN_ENV: &str = "FETCHQ_TELEGRAM_BOT_TOKEN";

/// Telegram notification settings (optional section in config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token used for sending updates. No token = notifications disabled.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Public URL prefix used when linking finished downloads in messages.
    #[serde(default)]
    pub base_external_url: Option<String>,
}

/// Global configuration loaded from `~/.config/fetchq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchqConfig {
    /// Folder where job directories are created. Relative paths resolve against the working directory.
    pub download_root: PathBuf,
    /// SQLite job database. None = `~/.local/state/fetchq/jobs.db`.
    pub database_path: Option<PathBuf>,
    /// Maximum number of simultaneous downloads (1-10).
    pub max_concurrent_downloads: usize,
    /// Minimum percentage delta before pushing another progress notification.
    pub notifier_min_percent_step: f64,
    /// Convert finished video files to MP4 in the background.
    pub transcode_to_mp4: bool,
    /// Number of parallel ffmpeg processes (1-4).
    pub transcode_workers: usize,
    /// Optional allow list of source hostnames (suffix match). Empty = allow all.
    pub allowed_source_domains: Vec<String>,
    /// Seconds `stop` waits for in-flight jobs before abandoning them.
    pub shutdown_grace_secs: u64,
    /// Program used to fetch media.
    pub yt_dlp_program: String,
    /// Program used for MP4 transcoding.
    pub ffmpeg_program: String,
    pub telegram: TelegramConfig,
}

impl Default for FetchqConfig {
    fn default() -> Self {
        Self {
            download_root: PathBuf::from("downloads"),
            database_path: None,
            max_concurrent_downloads: 1,
            notifier_min_percent_step: 10.0,
            transcode_to_mp4: false,
            transcode_workers: 1,
            allowed_source_domains: Vec::new(),
            shutdown_grace_secs: 30,
            yt_dlp_program: "yt-dlp".to_string(),
            ffmpeg_program: "ffmpeg".to_string(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl FetchqConfig {
    /// Reject values outside their documented ranges.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CONCURRENT_DOWNLOADS).contains(&self.max_concurrent_downloads) {
            bail!(
                "max_concurrent_downloads must be between 1 and {}, got {}",
                MAX_CONCURRENT_DOWNLOADS,
                self.max_concurrent_downloads
            );
        }
        if !(1..=MAX_TRANSCODE_WORKERS).contains(&self.transcode_workers) {
            bail!(
                "transcode_workers must be between 1 and {}, got {}",
                MAX_TRANSCODE_WORKERS,
                self.transcode_workers
            );
        }
        if !self.notifier_min_percent_step.is_finite() || self.notifier_min_percent_step < 0.0 {
            bail!(
                "notifier_min_percent_step must be a finite, non-negative number, got {}",
                self.notifier_min_percent_step
            );
        }
        if self.download_root.as_os_str().is_empty() {
            bail!("download_root must not be empty");
        }
        Ok(())
    }

    /// Apply environment overrides (currently only the bot token).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(BOT_TOKEN_ENV) {
            let token = token.trim();
            if !token.is_empty() {
                self.telegram.bot_token = Some(token.to_string());
            }
        }
    }

    /// Bot token, if one is configured and non-empty.
    pub fn bot_token(&self) -> Option<&str> {
        self.telegram
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
/// Environment overrides are applied and the result is validated.
pub fn load_or_init() -> Result<FetchqConfig> {
    let path = config_path()?;
    let mut cfg = if !path.exists() {
        let default_cfg = FetchqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        default_cfg
    } else {
        let data = fs::read_to_string(&path)?;
        toml::from_str(&data)?
    };

    cfg.apply_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}

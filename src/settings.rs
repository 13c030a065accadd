use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://kenshi.fandom.com";
const MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    /// Relative to the working directory.
    pub db_path: PathBuf,
    /// Relative to the executable's directory.
    pub images_dir: PathBuf,
    /// Relative to the executable's directory.
    pub log_dir: PathBuf,
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            db_path: PathBuf::from("KenshiData"),
            images_dir: PathBuf::from("images"),
            log_dir: PathBuf::from("logs"),
            concurrency: 6,
            user_agent: format!("kenshi_scraper/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    /// Defaults, then `kenshi_scraper.toml` if present, then `KENSHI_*` variables.
    pub fn load() -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("kenshi_scraper").required(false))
            .add_source(Environment::with_prefix("KENSHI"))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Ok(settings.anchored(&exe_dir))
    }

    fn anchored(mut self, exe_dir: &Path) -> Self {
        self.images_dir = exe_dir.join(&self.images_dir);
        self.log_dir = exe_dir.join(&self.log_dir);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

// src/config/mod.rs
//! Runtime configuration: `config/radar.toml` plus env overrides.
//!
//! Lookup order for the file:
//! 1) `$RADAR_CONFIG_PATH` (must exist)
//! 2) `config/radar.toml`
//! 3) built-in defaults

pub mod taxonomy;
pub mod zone;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RadarError, Result};
use crate::matcher::Normalization;
use crate::report::ReportMode;

pub use zone::ReportZone;

pub const DEFAULT_CONFIG_PATH: &str = "config/radar.toml";
pub const ENV_CONFIG_PATH: &str = "RADAR_CONFIG_PATH";
pub const ENV_REPORT_MODE: &str = "RADAR_REPORT_MODE";
pub const ENV_TIMEZONE: &str = "RADAR_TIMEZONE";
pub const ENV_DATA_DIR: &str = "RADAR_DATA_DIR";
pub const ENV_TAXONOMY_PATH: &str = "RADAR_TAXONOMY_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub mode: ReportMode,
    /// Zone of the report day: IANA name ("Asia/Shanghai") or offset ("+08:00").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            mode: ReportMode::default(),
            timezone: default_timezone(),
        }
    }
}

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "yes")]
    pub fold_case: bool,
    #[serde(default = "yes")]
    pub fold_width: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fold_case: true,
            fold_width: true,
        }
    }
}

impl MatchingConfig {
    pub fn normalization(&self) -> Normalization {
        Normalization {
            fold_case: self.fold_case,
            fold_width: self.fold_width,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxonomyConfig {
    #[serde(default = "default_taxonomy_path")]
    pub path: PathBuf,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            path: default_taxonomy_path(),
        }
    }
}

fn default_taxonomy_path() -> PathBuf {
    PathBuf::from("config/frequency_words.txt")
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// 0 disables pruning.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_retention_days() -> u32 {
    7
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Minimum gap between two pushes; 0 = no cooldown.
    #[serde(default)]
    pub cooldown_secs: i64,
    /// Push even when the payload has no matches.
    #[serde(default)]
    pub notify_on_empty: bool,
    /// Titles listed per category in pushed messages.
    #[serde(default)]
    pub max_titles_per_category: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub hotlists: Vec<SourceConfig>,
    #[serde(default)]
    pub feeds: Vec<SourceConfig>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            hotlists: Vec::new(),
            feeds: Vec::new(),
        }
    }
}

fn default_interval_secs() -> u64 {
    1800
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
}

impl SourceConfig {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn yes() -> bool {
    true
}

impl AppConfig {
    /// Load using env var + fallbacks, then apply env overrides and validate.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(RadarError::config(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            Self::load_from(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::load_from(&default)?
            } else {
                tracing::debug!("no {DEFAULT_CONFIG_PATH}; using built-in defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RadarError::config(format!("reading config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(m) = std::env::var(ENV_REPORT_MODE) {
            self.report.mode = m.parse()?;
        }
        if let Ok(tz) = std::env::var(ENV_TIMEZONE) {
            self.report.timezone = tz;
        }
        if let Ok(d) = std::env::var(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(d);
        }
        if let Ok(t) = std::env::var(ENV_TAXONOMY_PATH) {
            self.taxonomy.path = PathBuf::from(t);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.report_zone()?;
        if self.notify.cooldown_secs < 0 {
            return Err(RadarError::config("notify.cooldown_secs must be >= 0"));
        }
        if self.crawler.interval_secs == 0 {
            return Err(RadarError::config("crawler.interval_secs must be > 0"));
        }
        Ok(())
    }

    pub fn report_zone(&self) -> Result<ReportZone> {
        self.report.timezone.parse()
    }
}

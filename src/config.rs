//! Application settings.
//!
//! Loaded from a TOML file (`-c` flag, else `./partdex.toml` when
//! present, else defaults), with a couple of environment overrides for
//! the knobs that vary per machine.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::dispatch::DispatchMode;
use crate::scrapers::browser::SessionConfig;
use crate::scrapers::FetchConfig;
use crate::services::{DiscoveryConfig, DownloadConfig};

const CONFIG_FILENAME: &str = "partdex.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Root for the catalog database and other persistent state.
    pub data_dir: PathBuf,
    pub database_filename: String,
    /// Root of the download tree.
    pub index_dir: PathBuf,
    /// Explicit browser binary; common install locations are probed when
    /// unset.
    pub browser_binary: Option<PathBuf>,
    pub page_load_timeout_secs: u64,
    pub implicit_wait_ms: u64,
    pub settle_delay_secs: u64,
    pub max_session_attempts: u32,
    pub max_action_attempts: u32,
    /// Per-row discovery attempt cap; 0 disables the cap.
    pub max_discovery_attempts: u32,
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub connect_retries: u32,
    pub backoff_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("partdex");
        let index_root = dirs::desktop_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let stamp = chrono::Local::now().format("%Y%m%d-%H");
        Self {
            data_dir,
            database_filename: "catalog.db".to_string(),
            index_dir: index_root.join(format!("product_index_{stamp}")),
            browser_binary: None,
            page_load_timeout_secs: 60,
            implicit_wait_ms: 2000,
            settle_delay_secs: 6,
            max_session_attempts: 5,
            max_action_attempts: 15,
            max_discovery_attempts: 10,
            workers: 4,
            request_timeout_secs: 30,
            connect_retries: 5,
            backoff_secs: 2,
            user_agent: format!("partdex/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    /// Load settings: explicit path, else `./partdex.toml` when present,
    /// else defaults. `PARTDEX_DATA_DIR` and `PARTDEX_BROWSER` override
    /// the file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => Self::parse_file(path)?,
            None => {
                let local = Path::new(CONFIG_FILENAME);
                if local.exists() {
                    Self::parse_file(local)?
                } else {
                    Self::default()
                }
            }
        };
        if let Ok(dir) = env::var("PARTDEX_DATA_DIR") {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Ok(binary) = env::var("PARTDEX_BROWSER") {
            settings.browser_binary = Some(PathBuf::from(binary));
        }
        Ok(settings)
    }

    fn parse_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating data dir {}", self.data_dir.display()))?;
        fs::create_dir_all(&self.index_dir)
            .with_context(|| format!("creating index dir {}", self.index_dir.display()))?;
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            browser_binary: self.browser_binary.clone(),
            implicit_wait: Duration::from_millis(self.implicit_wait_ms),
            extra_args: Vec::new(),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            connect_retries: self.connect_retries,
            backoff_base: Duration::from_secs(self.backoff_secs),
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            page_load_timeout: Duration::from_secs(self.page_load_timeout_secs),
            max_attempts: match self.max_discovery_attempts {
                0 => None,
                cap => Some(cap),
            },
        }
    }

    pub fn download_config(&self, mode: DispatchMode) -> DownloadConfig {
        DownloadConfig {
            index_dir: self.index_dir.clone(),
            max_session_attempts: self.max_session_attempts,
            max_action_attempts: self.max_action_attempts,
            page_load_timeout: Duration::from_secs(self.page_load_timeout_secs),
            settle_delay: Duration::from_secs(self.settle_delay_secs),
            workers: self.workers,
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings: Settings = toml::from_str("").expect("parse");
        assert_eq!(settings.max_session_attempts, 5);
        assert_eq!(settings.max_action_attempts, 15);
        assert_eq!(settings.connect_retries, 5);
        assert_eq!(settings.settle_delay_secs, 6);
    }

    #[test]
    fn partial_file_overrides_selectively() {
        let settings: Settings = toml::from_str(
            r#"
            workers = 8
            index_dir = "/srv/index"
            max_discovery_attempts = 0
            "#,
        )
        .expect("parse");
        assert_eq!(settings.workers, 8);
        assert_eq!(settings.index_dir, PathBuf::from("/srv/index"));
        assert_eq!(settings.discovery_config().max_attempts, None);
        assert_eq!(settings.max_session_attempts, 5);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("max_retries = 3").is_err());
    }

    #[test]
    fn database_path_joins_dir_and_filename() {
        let mut settings = Settings::default();
        settings.data_dir = PathBuf::from("/var/lib/partdex");
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/var/lib/partdex/catalog.db")
        );
    }
}

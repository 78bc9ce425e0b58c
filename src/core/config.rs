use crate::core::batch::DEFAULT_MAX_CONCURRENCY;
use crate::core::valuation::MissingQuotePolicy;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_EASTMONEY_URL: &str = "http://fundf10.eastmoney.com";
pub const DEFAULT_EASTMONEY_HISTORY_URL: &str = "http://fund.eastmoney.com";
pub const DEFAULT_SINA_URL: &str = "http://hq.sinajs.cn";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EastmoneyProviderConfig {
    pub base_url: String,
    #[serde(default = "default_history_url")]
    pub history_base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SinaProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub eastmoney: Option<EastmoneyProviderConfig>,
    pub sina: Option<SinaProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            eastmoney: Some(EastmoneyProviderConfig {
                base_url: DEFAULT_EASTMONEY_URL.to_string(),
                history_base_url: DEFAULT_EASTMONEY_HISTORY_URL.to_string(),
            }),
            sina: Some(SinaProviderConfig {
                base_url: DEFAULT_SINA_URL.to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn eastmoney_url(&self) -> &str {
        self.eastmoney
            .as_ref()
            .map_or(DEFAULT_EASTMONEY_URL, |p| &p.base_url)
    }

    pub fn eastmoney_history_url(&self) -> &str {
        self.eastmoney
            .as_ref()
            .map_or(DEFAULT_EASTMONEY_HISTORY_URL, |p| &p.history_base_url)
    }

    pub fn sina_url(&self) -> &str {
        self.sina.as_ref().map_or(DEFAULT_SINA_URL, |p| &p.base_url)
    }
}

fn default_history_url() -> String {
    DEFAULT_EASTMONEY_HISTORY_URL.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EstimatorConfig {
    pub max_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub missing_quote_policy: MissingQuotePolicy,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout_secs: 10,
            missing_quote_policy: MissingQuotePolicy::default(),
        }
    }
}

impl EstimatorConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "navcast", "navcast")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "navcast", "navcast")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

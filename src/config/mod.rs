use std::{fs, path::Path, time::Duration};

use reqwest::Url;
use serde::Deserialize;

use crate::core::error::NinaError;
use crate::sources::fetcher::FetchMode;

pub const DEFAULT_API_BASE: &str = "https://warnung.bund.de/api31";
pub const DEFAULT_WEB_BASE: &str = "https://warnung.bund.de";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedConfig {
    pub name: String,
    pub enabled: bool,
    /// Path below `api_base`; `{region}` expands once per region code.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base: String,
    pub web_base: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub fetch_mode: FetchMode,
    pub region_codes: Vec<String>,
    pub feeds: Vec<FeedConfig>,
    pub radius_km: f64,
    pub max_alerts: usize,
    pub refresh_interval_secs: u64,
    pub refresh_on_viewport_change: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            timeout_ms: 10_000,
            user_agent: "nina-panel/0.2".to_string(),
            fetch_mode: FetchMode::Accumulate,
            region_codes: vec!["082140000000".to_string(), "082120000000".to_string()],
            feeds: default_feeds(),
            radius_km: 100.0,
            max_alerts: 20,
            refresh_interval_secs: 300,
            refresh_on_viewport_change: false,
        }
    }
}

impl AppConfig {
    /// Settings of the first panel release: stop at the first feed that answers.
    pub fn first_revision() -> Self {
        Self::default().into_first_revision()
    }

    /// Applies the first-release fetch settings, keeping URLs and regions.
    pub fn into_first_revision(mut self) -> Self {
        self.timeout_ms = 8_000;
        self.fetch_mode = FetchMode::FirstSuccess;
        self.max_alerts = 15;
        self.feeds.retain(|f| !f.name.eq_ignore_ascii_case("mowas"));
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Expands enabled feeds into the ordered endpoint list.
    pub fn endpoints(&self) -> Vec<String> {
        let base = self.api_base.trim_end_matches('/');
        let mut out = Vec::new();
        for feed in self.feeds.iter().filter(|f| f.enabled) {
            let path = if feed.path.starts_with('/') {
                feed.path.clone()
            } else {
                format!("/{}", feed.path)
            };
            if path.contains("{region}") {
                for code in &self.region_codes {
                    out.push(format!("{}{}", base, path.replace("{region}", code)));
                }
            } else {
                out.push(format!("{}{}", base, path));
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), NinaError> {
        Url::parse(&self.api_base)
            .map_err(|e| NinaError::Config(format!("api_base: {}", e)))?;
        Url::parse(&self.web_base)
            .map_err(|e| NinaError::Config(format!("web_base: {}", e)))?;
        if self.radius_km.is_nan() || self.radius_km <= 0.0 {
            return Err(NinaError::Config("radius_km must be positive".into()));
        }
        if self.timeout_ms == 0 {
            return Err(NinaError::Config("timeout_ms must be at least 1".into()));
        }
        if self.max_alerts == 0 {
            return Err(NinaError::Config("max_alerts must be at least 1".into()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(NinaError::Config(
                "refresh_interval_secs must be at least 1".into(),
            ));
        }
        if self.endpoints().is_empty() {
            return Err(NinaError::Config("no enabled feeds".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: Option<&str>) -> Result<AppConfig, NinaError> {
    let default_path = Path::new("config/nina.toml");
    let path = path.map(Path::new).unwrap_or(default_path);

    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| NinaError::Config(e.to_string()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig, NinaError> {
    let cfg: AppConfig = toml::from_str(content).map_err(|e| NinaError::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn apply_feed_filter(cfg: AppConfig, names: Option<&[String]>) -> AppConfig {
    if let Some(list) = names {
        let mut cfg = cfg;
        let lowered: Vec<String> = list.iter().map(|s| s.to_lowercase()).collect();
        for f in cfg.feeds.iter_mut() {
            f.enabled = lowered.iter().any(|n| n == &f.name.to_lowercase());
        }
        return cfg;
    }
    cfg
}

fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig {
            name: "dashboard".to_string(),
            enabled: true,
            path: "/dashboard/{region}.json".to_string(),
        },
        FeedConfig {
            name: "katwarn".to_string(),
            enabled: true,
            path: "/katwarn/mapData.json".to_string(),
        },
        FeedConfig {
            name: "biwapp".to_string(),
            enabled: true,
            path: "/biwapp/mapData.json".to_string(),
        },
        FeedConfig {
            name: "dwd".to_string(),
            enabled: true,
            path: "/dwd/mapData.json".to_string(),
        },
        FeedConfig {
            name: "mowas".to_string(),
            enabled: true,
            path: "/mowas/mapData.json".to_string(),
        },
    ]
}

//! Runtime configuration read from the environment.

use std::path::Path;

use anyhow::{Context, ensure};
use chrono::Duration;

use forgepos_sales::{DEFAULT_RECENT_WINDOW_DAYS, ShopConfig};

use crate::error::PosError;

pub const RECENT_WINDOW_ENV: &str = "FORGEPOS_RECENT_WINDOW_DAYS";
pub const SHOPS_FILE_ENV: &str = "FORGEPOS_SHOPS_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosConfig {
    /// How far back the recent-orders feed looks.
    pub recent_window_days: i64,
    /// Shops registered with the ledger at startup.
    pub shops: Vec<ShopConfig>,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            shops: Vec::new(),
        }
    }
}

impl PosConfig {
    pub fn from_env() -> Result<Self, PosError> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build from an arbitrary variable source (unset variables keep defaults).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(RECENT_WINDOW_ENV) {
            let days: i64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{RECENT_WINDOW_ENV} must be a whole number of days, got '{raw}'"))?;
            ensure!(days > 0, "{RECENT_WINDOW_ENV} must be positive, got {days}");
            config.recent_window_days = days;
        }

        if let Some(path) = lookup(SHOPS_FILE_ENV) {
            config.shops = load_shops(Path::new(&path))?;
        }

        Ok(config)
    }

    pub fn recent_window(&self) -> Duration {
        Duration::days(self.recent_window_days)
    }
}

/// Read a JSON array of shop configurations.
pub fn load_shops(path: &Path) -> anyhow::Result<Vec<ShopConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read shops file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse shops file {}", path.display()))
}

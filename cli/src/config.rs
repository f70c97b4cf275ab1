use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PRICE_URL: &str = "https://www.rohlik.cz/api/v1/products/prices";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct Config {
    pub catalog_path: PathBuf,
    pub price_url: String,
    pub timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "bakecost").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Self::from_lookup(&data_dir, |key| std::env::var(key).ok())
    }

    /// Build the config from a data directory and an environment lookup.
    fn from_lookup(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let catalog_path = env("BAKECOST_CATALOG")
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| data_dir.join("ingredients.json"), PathBuf::from);

        let price_url = env("BAKECOST_PRICE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PRICE_URL.to_string());

        let timeout_secs = match env("BAKECOST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("Invalid BAKECOST_TIMEOUT_SECS '{raw}'. Use a whole number of seconds")
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            catalog_path,
            price_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Apply the `--catalog` flag, which beats the environment.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Option<PathBuf>) -> Self {
        if let Some(path) = catalog {
            self.catalog_path = path;
        }
        self
    }
}

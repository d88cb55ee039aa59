/// Configuration management for gedcom-lineage
use crate::error::GedcomError;
use crate::geocoding::client::DEFAULT_BASE_URL;
use crate::types::{OutputFormat, RenderScope};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ACCESS_TOKEN_ENV: &str = "MAPBOX_ACCESS_TOKEN";
pub const DEFAULT_ACCESS_TOKEN_FILE: &str = "mapbox_access_token.txt";
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoding: GeocodingSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingSettings {
    pub enabled: bool,
    pub access_token: Option<String>,
    pub access_token_file: Option<PathBuf>,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub format: OutputFormat,
    pub scope: RenderScope,
    pub root: Option<String>,
    pub direct_only: bool,
    pub timeline: bool,
}

impl Default for GeocodingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: None,
            access_token_file: Some(PathBuf::from(DEFAULT_ACCESS_TOKEN_FILE)),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            scope: RenderScope::Lineage,
            root: None,
            direct_only: false,
            timeline: true,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content).context("Failed to parse configuration file")?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        Self::from_env_lookup(|key| std::env::var(key).ok())
    }

    fn from_env_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        // Supplies the credential only; lookups stay opt-in
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|token| !token.trim().is_empty()) {
            config.geocoding.access_token = Some(token);
        }

        if let Some(base_url) = lookup("GEDCOM_LINEAGE_GEOCODING_URL") {
            config.geocoding.base_url = base_url;
        }

        if let Some(timeout) = lookup("GEDCOM_LINEAGE_GEOCODING_TIMEOUT_SECONDS") {
            config.geocoding.timeout_seconds = timeout
                .parse()
                .with_context(|| format!("Invalid geocoding timeout: {:?}", timeout))?;
        }

        Ok(config)
    }

    /// Merge with another configuration (other takes precedence)
    pub fn merge_with(&mut self, other: Config) {
        let defaults = Config::default();

        // Geocoding
        self.geocoding.enabled |= other.geocoding.enabled;
        if other.geocoding.access_token.is_some() {
            self.geocoding.access_token = other.geocoding.access_token;
        }
        if other.geocoding.access_token_file != defaults.geocoding.access_token_file {
            self.geocoding.access_token_file = other.geocoding.access_token_file;
        }
        if other.geocoding.base_url != defaults.geocoding.base_url {
            self.geocoding.base_url = other.geocoding.base_url;
        }
        if other.geocoding.timeout_seconds != defaults.geocoding.timeout_seconds {
            self.geocoding.timeout_seconds = other.geocoding.timeout_seconds;
        }

        // Rendering
        if other.render.format != defaults.render.format {
            self.render.format = other.render.format;
        }
        if other.render.scope != defaults.render.scope {
            self.render.scope = other.render.scope;
        }
        if other.render.root.is_some() {
            self.render.root = other.render.root;
        }
        self.render.direct_only |= other.render.direct_only;
        if other.render.timeline != defaults.render.timeline {
            self.render.timeline = other.render.timeline;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.geocoding.timeout_seconds == 0 {
            return Err(GedcomError::InvalidConfig("Geocoding timeout must be greater than 0".to_string()).into());
        }

        if self.geocoding.base_url.trim().is_empty() {
            return Err(GedcomError::InvalidConfig("Geocoding base URL must not be empty".to_string()).into());
        }

        Ok(())
    }

    /// The geocoding credential: explicit token, then token file, then
    /// environment. `None` means lookups are unavailable, which is not an error.
    pub async fn resolve_access_token(&self) -> Option<String> {
        if let Some(token) = non_blank(self.geocoding.access_token.as_deref()) {
            return Some(token);
        }

        if let Some(path) = &self.geocoding.access_token_file {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    if let Some(token) = non_blank(Some(&content)) {
                        debug!("Using geocoding token from {:?}", path);
                        return Some(token);
                    }
                    warn!("Geocoding token file {:?} is empty", path);
                }
                Err(e) => debug!("No geocoding token file at {:?}: {}", path, e),
            }
        }

        non_blank(std::env::var(ACCESS_TOKEN_ENV).ok().as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

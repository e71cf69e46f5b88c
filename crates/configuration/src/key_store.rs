use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The two opaque provider credentials the user supplies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub structured_api_key: Option<String>,
    #[serde(default)]
    pub ai_search_key: Option<String>,
}

impl ApiKeys {
    /// Fills any missing key from `POLYGON_API_KEY` / `GEMINI_API_KEY`.
    pub fn with_env_fallback(mut self) -> Self {
        if self.structured_api_key.is_none() {
            self.structured_api_key = non_empty(std::env::var("POLYGON_API_KEY").ok());
        }
        if self.ai_search_key.is_none() {
            self.ai_search_key = non_empty(std::env::var("GEMINI_API_KEY").ok());
        }
        self
    }
}

/// Local, file-backed storage for [`ApiKeys`].
///
/// The keys are only ever read back to be sent as provider credentials.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    /// A store at `<config dir>/yieldscope/keys.json`.
    pub fn default_location() -> Result<Self, ConfigError> {
        let base = dirs::config_dir().ok_or_else(|| ConfigError::KeyStore {
            path: "<config dir>".to_string(),
            message: "no per-user configuration directory on this platform".to_string(),
        })?;
        Ok(Self::at(base.join("yieldscope").join("keys.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored keys. A missing file yields empty keys.
    pub fn load(&self) -> Result<ApiKeys, ConfigError> {
        if !self.path.exists() {
            return Ok(ApiKeys::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
        let keys: ApiKeys = serde_json::from_str(&raw).map_err(|e| self.error(e))?;
        Ok(ApiKeys {
            structured_api_key: non_empty(keys.structured_api_key),
            ai_search_key: non_empty(keys.ai_search_key),
        })
    }

    pub fn save(&self, keys: &ApiKeys) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let raw = serde_json::to_string_pretty(keys).map_err(|e| self.error(e))?;
        fs::write(&self.path, raw).map_err(|e| self.error(e))?;
        tracing::debug!(path = %self.path.display(), "Saved API keys.");
        Ok(())
    }

    pub fn set_structured(&self, key: &str) -> Result<ApiKeys, ConfigError> {
        let mut keys = self.load()?;
        keys.structured_api_key = non_empty(Some(key.to_string()));
        self.save(&keys)?;
        Ok(keys)
    }

    pub fn set_ai_search(&self, key: &str) -> Result<ApiKeys, ConfigError> {
        let mut keys = self.load()?;
        keys.ai_search_key = non_empty(Some(key.to_string()));
        self.save(&keys)?;
        Ok(keys)
    }

    pub fn clear(&self) -> Result<(), ConfigError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| self.error(e))?;
        }
        Ok(())
    }

    fn error(&self, e: impl std::fmt::Display) -> ConfigError {
        ConfigError::KeyStore {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

/// Display form of a key: the first four characters followed by an ellipsis.
pub fn mask(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//! Pipeline configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional JSON file, then
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;
use wfgraph_fetch::FetchConfig;
use wfgraph_store::Neo4jConfig;

pub const ENV_NEO4J_URI: &str = "NEO4J_URI";
pub const ENV_NEO4J_USER: &str = "NEO4J_USER";
pub const ENV_NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";
pub const ENV_NEO4J_DATABASE: &str = "NEO4J_DATABASE";
pub const ENV_LANGUAGE: &str = "WFGRAPH_LANG";
pub const ENV_DATA_DIR: &str = "WFGRAPH_DATA_DIR";
pub const ENV_INDEX_BASE_URL: &str = "WFGRAPH_INDEX_BASE_URL";
pub const ENV_MANIFEST_BASE_URL: &str = "WFGRAPH_MANIFEST_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Export language code, e.g. `en`.
    pub language: String,
    /// Where manifests and the decoded index are written and read back.
    pub data_dir: PathBuf,
    pub fetch: FetchConfig,
    pub neo4j: Neo4jConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            data_dir: PathBuf::from("data_raw"),
            fetch: FetchConfig::default(),
            neo4j: Neo4jConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl PipelineConfig {
    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file; sections and fields it omits keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay variables from `lookup`. Unset and empty variables are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_NEO4J_URI) {
            self.neo4j.uri = v;
        }
        if let Some(v) = get(ENV_NEO4J_USER) {
            self.neo4j.user = v;
        }
        if let Some(v) = get(ENV_NEO4J_PASSWORD) {
            self.neo4j.password = v;
        }
        if let Some(v) = get(ENV_NEO4J_DATABASE) {
            self.neo4j.database = v;
        }
        if let Some(v) = get(ENV_LANGUAGE) {
            self.language = v;
        }
        if let Some(v) = get(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_INDEX_BASE_URL) {
            self.fetch.index_base_url = v;
        }
        if let Some(v) = get(ENV_MANIFEST_BASE_URL) {
            self.fetch.manifest_base_url = v;
        }
    }

    /// Checks that do not need the network or the store.
    ///
    /// The Neo4j password is checked only when a Neo4j store is opened, so
    /// `download` and in-memory runs work without one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.language.is_empty() || !self.language.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "language `{}` must be a non-empty alphanumeric code",
                self.language
            )));
        }
        for (name, value) in [
            ("fetch.index_base_url", &self.fetch.index_base_url),
            ("fetch.manifest_base_url", &self.fetch.manifest_base_url),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name} `{value}`: {e}")))?;
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

//! wfgraph content-host access
//!
//! ```text
//!   GET <index-base>/index_<lang>.txt.lzma ──► decompress ──► ManifestIndex
//!                                                                │
//!   GET <manifest-base>/<name>!<hash> ◄──────────────────────────┘ (per id)
//!          │
//!          ▼
//!   <data-dir>/<name>   (pretty-printed JSON)
//! ```
//!
//! A failed index fetch or decode aborts the caller's run; a failed manifest
//! is reported in [`DownloadReport`] and the batch carries on.

pub mod decompress;
pub mod download;
pub mod index;

pub use decompress::{decompress, DecodeError, FrameError};
pub use download::{
    save_index_text, ContentClient, DownloadReport, FailedManifest, FetchedIndex, SavedManifest,
};
pub use index::{ManifestId, ManifestIndex};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_INDEX_BASE_URL: &str = "https://origin.warframe.com/PublicExport";
pub const DEFAULT_MANIFEST_BASE_URL: &str = "http://content.warframe.com/PublicExport/Manifest";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Directory URL holding `index_<lang>.txt.lzma`.
    pub index_base_url: String,
    /// Directory URL holding the manifests themselves.
    pub manifest_base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            index_base_url: DEFAULT_INDEX_BASE_URL.to_string(),
            manifest_base_url: DEFAULT_MANIFEST_BASE_URL.to_string(),
            timeout_secs: 60,
            user_agent: format!("wfgraph/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid base url `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base url `{0}` cannot carry a path")]
    NotABase(String),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: url::Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: url::Url,
        status: reqwest::StatusCode,
    },

    #[error("{url} did not return valid JSON: {source}")]
    Json {
        url: url::Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("index for language `{language}` could not be decoded: {source}")]
    Decode {
        language: String,
        #[source]
        source: DecodeError,
    },

    #[error("decoded index is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("manifest `{0}` does not name a plain file")]
    UnsafeFileName(ManifestId),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

//! wfgraph ingestion
//!
//! Drives the export from the content host into a [`GraphStore`](wfgraph_store::GraphStore):
//!
//! ```text
//!   download:  index_<lang>.txt.lzma ──► decompress ──► manifest ids ──► <data_dir>/*.json
//!   ingest:    <data_dir>/Export{Resources,Weapons,Recipes}_<lang>.json
//!                 ──► validate ──► Materializer ──► GraphStore ──► summary
//! ```
//!
//! - [`config`]: layered pipeline configuration
//! - [`materialize`]: the three ordered graph passes
//! - [`pipeline`]: file loading, the clear gate and end-to-end runs

pub mod config;
pub mod materialize;
pub mod pipeline;

pub use config::{ConfigError, PipelineConfig};
pub use materialize::{CategoryIndex, Materializer, NodePassReport, RecipeReport, WeaponReport};
pub use pipeline::{
    download, ingest, load_records, run, DownloadOutcome, IngestOptions, IngestReport,
    ManifestLoadError, RunReport,
};

use std::path::PathBuf;

use wfgraph_fetch::FetchError;
use wfgraph_model::NodeRef;
use wfgraph_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not build properties for {node}: {source}")]
    Properties {
        node: NodeRef,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

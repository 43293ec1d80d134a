//! End-to-end runs: download, ingest, or both.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use wfgraph_fetch::{save_index_text, ContentClient, DownloadReport};
use wfgraph_model::{
    records_from_document, validate_batch, DocumentError, Entity, EntityKind, RawRecord, Recipe,
    RecordFailure, Resource, Weapon,
};
use wfgraph_store::{GraphStore, GraphSummary};

use crate::materialize::{Materializer, NodePassReport, RecipeReport, WeaponReport};
use crate::{IngestError, PipelineConfig};

// ============================================================================
// Download
// ============================================================================

#[derive(Debug)]
pub struct DownloadOutcome {
    /// Where the decoded index text was written.
    pub index_path: PathBuf,
    /// Manifest ids listed in the index.
    pub manifests: usize,
    pub report: DownloadReport,
}

/// Fetch the index and download every manifest it lists into the data dir.
///
/// A missing or undecodable index aborts; individual manifests do not.
pub async fn download(config: &PipelineConfig) -> Result<DownloadOutcome, IngestError> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .map_err(|source| IngestError::Io {
            path: config.data_dir.clone(),
            source,
        })?;

    let client = ContentClient::new(&config.fetch)?;
    let fetched = client.fetch_index(&config.language).await?;
    let index_path = save_index_text(&config.data_dir, &fetched).await?;

    let report = client.download_all(&fetched.index, &config.data_dir).await;
    info!(
        listed = fetched.index.len(),
        saved = report.saved.len(),
        failed = report.failed.len(),
        "download finished"
    );
    Ok(DownloadOutcome {
        index_path,
        manifests: fetched.index.len(),
        report,
    })
}

// ============================================================================
// Ingest
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Delete every node and edge first, subject to confirmation.
    pub clear_first: bool,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub cleared: bool,
    /// Records that failed validation.
    pub rejected: Vec<RecordFailure>,
    /// Manifests that could not be read; their pass ran empty.
    pub skipped_manifests: Vec<ManifestLoadError>,
    pub resources: NodePassReport,
    pub weapons: WeaponReport,
    pub recipes: RecipeReport,
    pub summary: GraphSummary,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestLoadError {
    #[error("{kind} manifest {path} not found")]
    Missing { kind: EntityKind, path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
}

/// Read `<data_dir>/Export<Kind>_<lang>.json` and return its records.
pub async fn load_records(
    data_dir: &Path,
    language: &str,
    kind: EntityKind,
) -> Result<Vec<RawRecord>, ManifestLoadError> {
    let path = data_dir.join(kind.manifest_file_name(language));
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ManifestLoadError::Missing { kind, path });
        }
        Err(source) => return Err(ManifestLoadError::Read { path, source }),
    };
    let document = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(document) => document,
        Err(source) => return Err(ManifestLoadError::Json { path, source }),
    };
    records_from_document(kind, document).map_err(|source| ManifestLoadError::Document { path, source })
}

async fn load_batch<T: Entity>(config: &PipelineConfig, report: &mut IngestReport) -> Vec<T> {
    match load_records(&config.data_dir, &config.language, T::KIND).await {
        Ok(records) => {
            let total = records.len();
            let batch = validate_batch::<T>(records);
            info!(
                kind = %T::KIND,
                total,
                valid = batch.entities.len(),
                rejected = batch.failures.len(),
                "validated"
            );
            report.rejected.extend(batch.failures);
            batch.entities
        }
        Err(error) => {
            warn!(kind = %T::KIND, error = %error, "manifest unavailable, pass will be empty");
            report.skipped_manifests.push(error);
            Vec::new()
        }
    }
}

/// Validate the local manifests and materialize them into `store`.
///
/// With `clear_first`, `confirm` is asked once before anything is deleted;
/// declining keeps the existing graph and continues.
pub async fn ingest<S, F>(
    store: &S,
    config: &PipelineConfig,
    options: IngestOptions,
    confirm: F,
) -> Result<IngestReport, IngestError>
where
    S: GraphStore + ?Sized,
    F: FnOnce() -> bool,
{
    let mut report = IngestReport::default();

    if options.clear_first {
        if confirm() {
            store.clear().await?;
            report.cleared = true;
        } else {
            info!("clear declined, keeping existing graph");
        }
    }

    let resources = load_batch::<Resource>(config, &mut report).await;
    let weapons = load_batch::<Weapon>(config, &mut report).await;
    let recipes = load_batch::<Recipe>(config, &mut report).await;

    let materializer = Materializer::new(store);
    report.resources = materializer.upsert_resources(&resources).await;
    report.weapons = materializer.upsert_weapons(&weapons).await;
    report.recipes = materializer.upsert_recipes_and_links(&recipes).await;

    report.summary = store.summary().await?;
    Ok(report)
}

// ============================================================================
// Full run
// ============================================================================

#[derive(Debug)]
pub struct RunReport {
    pub download: DownloadOutcome,
    pub ingest: IngestReport,
}

/// [`download`] followed by [`ingest`].
pub async fn run<S, F>(
    store: &S,
    config: &PipelineConfig,
    options: IngestOptions,
    confirm: F,
) -> Result<RunReport, IngestError>
where
    S: GraphStore + ?Sized,
    F: FnOnce() -> bool,
{
    let download = download(config).await?;
    let ingest = ingest(store, config, options, confirm).await?;
    Ok(RunReport { download, ingest })
}

//! Index fetch and manifest download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::decompress::decompress;
use crate::index::{ManifestId, ManifestIndex};
use crate::{FetchConfig, FetchError};

/// The decoded index plus the text it was parsed from.
#[derive(Debug, Clone)]
pub struct FetchedIndex {
    pub language: String,
    pub text: String,
    pub index: ManifestIndex,
}

#[derive(Debug, Clone)]
pub struct SavedManifest {
    pub id: ManifestId,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct FailedManifest {
    pub id: ManifestId,
    pub error: FetchError,
}

/// Outcome of a batch download. Failures never abort the batch.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub saved: Vec<SavedManifest>,
    pub failed: Vec<FailedManifest>,
}

impl DownloadReport {
    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failed.len()
    }
}

/// HTTP client for the export's content host.
pub struct ContentClient {
    http: Client,
    index_base: Url,
    manifest_base: Url,
}

impl ContentClient {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("wfgraph")),
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            http,
            index_base: parse_base(&config.index_base_url)?,
            manifest_base: parse_base(&config.manifest_base_url)?,
        })
    }

    pub fn index_url(&self, language: &str) -> Url {
        join_segment(&self.index_base, &format!("index_{language}.txt.lzma"))
    }

    /// The full identifier, hash included, is the manifest's path on the host.
    pub fn manifest_url(&self, id: &ManifestId) -> Url {
        join_segment(&self.manifest_base, id.as_str())
    }

    /// Fetch and decode the index for `language`.
    pub async fn fetch_index(&self, language: &str) -> Result<FetchedIndex, FetchError> {
        let url = self.index_url(language);
        tracing::info!(%url, "fetching manifest index");
        let bytes = self.get_bytes(&url).await?;

        let decoded = decompress(&bytes).map_err(|source| FetchError::Decode {
            language: language.to_string(),
            source,
        })?;
        let text = String::from_utf8(decoded)?;
        let index = ManifestIndex::parse(&text);
        tracing::info!(manifests = index.len(), "decoded manifest index");

        Ok(FetchedIndex {
            language: language.to_string(),
            text,
            index,
        })
    }

    /// Fetch one manifest's JSON body.
    pub async fn fetch_manifest(&self, id: &ManifestId) -> Result<Value, FetchError> {
        let url = self.manifest_url(id);
        let bytes = self.get_bytes(&url).await?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Json { url, source })
    }

    /// Fetch one manifest and, when `save_dir` is given, persist it there
    /// under its `!`-stripped file name.
    pub async fn download_manifest(
        &self,
        id: &ManifestId,
        save_dir: Option<&Path>,
    ) -> Result<(Value, Option<PathBuf>), FetchError> {
        if !id.has_plain_file_name() {
            return Err(FetchError::UnsafeFileName(id.clone()));
        }
        let document = self.fetch_manifest(id).await?;
        let saved = match save_dir {
            Some(dir) => Some(save_manifest(dir, id, &document).await?),
            None => None,
        };
        Ok((document, saved))
    }

    /// Download every manifest in `index` into `dir`.
    pub async fn download_all(&self, index: &ManifestIndex, dir: &Path) -> DownloadReport {
        let mut report = DownloadReport::default();
        let total = index.len();

        for (i, id) in index.iter().enumerate() {
            tracing::info!(manifest = %id, progress = %format!("{}/{}", i + 1, total), "downloading");
            match self.download_manifest(id, Some(dir)).await {
                Ok((_, Some(path))) => {
                    tracing::info!(manifest = %id, path = %path.display(), "saved");
                    report.saved.push(SavedManifest {
                        id: id.clone(),
                        path,
                    });
                }
                Ok((_, None)) => {}
                Err(error) => {
                    tracing::warn!(manifest = %id, error = %error, "download failed, continuing");
                    report.failed.push(FailedManifest {
                        id: id.clone(),
                        error,
                    });
                }
            }
        }
        report
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.clone(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Persist decoded index text as `<dir>/index_<lang>.txt`.
pub async fn save_index_text(dir: &Path, fetched: &FetchedIndex) -> Result<PathBuf, FetchError> {
    let path = dir.join(format!("index_{}.txt", fetched.language));
    write_file(dir, &path, fetched.text.as_bytes()).await?;
    Ok(path)
}

async fn save_manifest(dir: &Path, id: &ManifestId, document: &Value) -> Result<PathBuf, FetchError> {
    let path = dir.join(id.file_name());
    let pretty = serde_json::to_vec_pretty(document).map_err(|source| FetchError::Io {
        path: path.clone(),
        source: source.into(),
    })?;
    write_file(dir, &path, &pretty).await?;
    Ok(path)
}

async fn write_file(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), FetchError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| FetchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_base(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|source| FetchError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(FetchError::NotABase(raw.to_string()));
    }
    Ok(url)
}

fn join_segment(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    // `parse_base` rejected cannot-be-a-base urls, so segments are available.
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(segment);
    }
    url
}

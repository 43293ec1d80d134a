//! Index fetch and manifest download against a local stand-in content host.

use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use wfgraph_fetch::{save_index_text, ContentClient, FetchConfig, FetchError, ManifestId};
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

type Routes = Arc<HashMap<String, (StatusCode, Vec<u8>)>>;

/// Serve fixed responses by request path; unknown paths are 404.
async fn serve(routes: HashMap<String, (StatusCode, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Routes = Arc::new(routes);

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let io = TokioIo::new(stream);
            let routes = routes.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let routes = routes.clone();
                    async move {
                        let (status, body) = routes
                            .get(req.uri().path())
                            .cloned()
                            .unwrap_or((StatusCode::NOT_FOUND, b"not found".to_vec()));
                        let mut resp = Response::new(Full::new(Bytes::from(body)));
                        *resp.status_mut() = status;
                        Ok::<_, Infallible>(resp)
                    }
                });
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    format!("http://{addr}")
}

fn lzma_frame(plain: &[u8]) -> Vec<u8> {
    let options = LzmaOptions::new_preset(1).unwrap();
    let stream = Stream::new_lzma_encoder(&options).unwrap();
    let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(plain).unwrap();
    encoder.finish().unwrap()
}

fn client(host: &str) -> ContentClient {
    ContentClient::new(&FetchConfig {
        index_base_url: format!("{host}/PublicExport"),
        manifest_base_url: format!("{host}/PublicExport/Manifest"),
        timeout_secs: 5,
        ..FetchConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn fetches_and_decodes_the_index() {
    let index_text = b"ExportResources_en.json!abc\nExportWeapons_en.json!def\n";
    let mut body = lzma_frame(index_text);
    body.extend_from_slice(&[0xFF, 0x00, 0x13]);

    let host = serve(HashMap::from([(
        "/PublicExport/index_en.txt.lzma".to_string(),
        (StatusCode::OK, body),
    )]))
    .await;

    let fetched = client(&host).fetch_index("en").await.unwrap();
    let ids: Vec<&str> = fetched.index.iter().map(ManifestId::as_str).collect();
    assert_eq!(ids, ["ExportResources_en.json!abc", "ExportWeapons_en.json!def"]);

    let dir = tempfile::tempdir().unwrap();
    let path = save_index_text(dir.path(), &fetched).await.unwrap();
    assert_eq!(path.file_name().unwrap(), "index_en.txt");
    assert_eq!(std::fs::read(&path).unwrap(), index_text);
}

#[tokio::test]
async fn missing_index_is_a_status_error() {
    let host = serve(HashMap::new()).await;
    let err = client(&host).fetch_index("xx").await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn undecodable_index_is_a_decode_error() {
    let host = serve(HashMap::from([(
        "/PublicExport/index_en.txt.lzma".to_string(),
        (StatusCode::OK, b"definitely not compressed".to_vec()),
    )]))
    .await;
    let err = client(&host).fetch_index("en").await.unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn download_all_tolerates_per_manifest_failures() {
    let resources = br#"{"ExportResources":[{"uniqueName":"Res1","name":"Ferrite"}]}"#;
    let host = serve(HashMap::from([
        (
            "/PublicExport/Manifest/ExportResources_en.json!abc".to_string(),
            (StatusCode::OK, resources.to_vec()),
        ),
        (
            "/PublicExport/Manifest/ExportWeapons_en.json!def".to_string(),
            (StatusCode::OK, b"{ not json".to_vec()),
        ),
        (
            "/PublicExport/Manifest/ExportRecipes_en.json!123".to_string(),
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()),
        ),
    ]))
    .await;

    let index = wfgraph_fetch::ManifestIndex::parse(
        "ExportResources_en.json!abc\nExportWeapons_en.json!def\nExportRecipes_en.json!123\nExportGone_en.json!404\n../escape.json!x\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let report = client(&host).download_all(&index, dir.path()).await;

    assert_eq!(report.attempted(), 5);
    assert_eq!(report.saved.len(), 1);
    assert_eq!(report.failed.len(), 4);

    let saved = &report.saved[0];
    assert_eq!(saved.path, dir.path().join("ExportResources_en.json"));
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&saved.path).unwrap()).unwrap();
    assert_eq!(on_disk["ExportResources"][0]["name"], "Ferrite");
    assert!(std::fs::read_to_string(&saved.path).unwrap().contains("\n  "));

    let failures: HashMap<&str, &FetchError> = report
        .failed
        .iter()
        .map(|f| (f.id.file_name(), &f.error))
        .collect();
    assert!(matches!(failures["ExportWeapons_en.json"], FetchError::Json { .. }));
    assert!(matches!(failures["ExportRecipes_en.json"], FetchError::Status { .. }));
    assert!(matches!(failures["ExportGone_en.json"], FetchError::Status { .. }));
    assert!(matches!(failures["../escape.json"], FetchError::UnsafeFileName(_)));
    assert!(!dir.path().join("ExportWeapons_en.json").exists());
}

#[tokio::test]
async fn refused_connections_fail_per_manifest() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = ContentClient::new(&FetchConfig {
        manifest_base_url: format!("http://{closed}/PublicExport/Manifest"),
        timeout_secs: 5,
        ..FetchConfig::default()
    })
    .unwrap();

    let index = wfgraph_fetch::ManifestIndex::parse(
        "ExportResources_en.json!abc\nExportWeapons_en.json!def\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let report = client.download_all(&index, dir.path()).await;

    assert_eq!(report.attempted(), 2);
    assert!(report.saved.is_empty());
    let names: Vec<&str> = report.failed.iter().map(|f| f.id.file_name()).collect();
    assert_eq!(names, ["ExportResources_en.json", "ExportWeapons_en.json"]);
    assert!(report
        .failed
        .iter()
        .all(|f| matches!(f.error, FetchError::Http { .. })));
}

#[tokio::test]
async fn redownload_overwrites_the_local_file() {
    let host = serve(HashMap::from([(
        "/PublicExport/Manifest/ExportResources_en.json!v2".to_string(),
        (StatusCode::OK, br#"{"ExportResources":[]}"#.to_vec()),
    )]))
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ExportResources_en.json");
    std::fs::write(&path, "stale").unwrap();

    let id = ManifestId::parse("ExportResources_en.json!v2").unwrap();
    let (document, saved) = client(&host)
        .download_manifest(&id, Some(dir.path()))
        .await
        .unwrap();
    assert_eq!(saved.as_deref(), Some(path.as_path()));
    assert_eq!(document["ExportResources"], serde_json::json!([]));
    assert_ne!(std::fs::read_to_string(&path).unwrap(), "stale");
}

//! Download + ingest against a local content host and the in-memory store.

use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use wfgraph_fetch::FetchConfig;
use wfgraph_ingest::{ingest, run, IngestOptions, ManifestLoadError, PipelineConfig};
use wfgraph_model::{EdgeKind, NodeLabel, NodeRef, PropertyMap};
use wfgraph_store::{GraphStore, MemoryGraph};
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

// ============================================================================
// Fixtures
// ============================================================================

async fn serve(routes: HashMap<String, Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let routes = routes.clone();
                    async move {
                        let resp = match routes.get(req.uri().path()) {
                            Some(body) => Response::new(Full::new(Bytes::from(body.clone()))),
                            None => {
                                let mut resp = Response::new(Full::new(Bytes::new()));
                                *resp.status_mut() = StatusCode::NOT_FOUND;
                                resp
                            }
                        };
                        Ok::<_, Infallible>(resp)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
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

fn export_documents() -> [(&'static str, serde_json::Value); 3] {
    [
        (
            "ExportResources_en.json",
            json!({"ExportResources": [
                {"uniqueName": "Res1", "name": "Ferrite", "codexSecret": false},
                {"uniqueName": "Res2", "name": "Rubedo"},
                {"name": "no key"},
            ]}),
        ),
        (
            "ExportWeapons_en.json",
            json!({"ExportWeapons": [
                {"uniqueName": "W1", "name": "Lato", "productCategory": "Pistols", "masteryReq": 0},
                {"uniqueName": "W2", "name": "Braton", "productCategory": "LongGuns", "newStat": {"a": 1}},
            ]}),
        ),
        (
            "ExportRecipes_en.json",
            json!({"ExportRecipes": [
                {"uniqueName": "R1", "resultType": "W1", "num": 2,
                 "ingredients": [{"ItemType": "Res1", "ItemCount": 5}]},
                {"uniqueName": "R2", "resultType": "Res2",
                 "ingredients": [{"ItemType": "Res1", "ItemCount": 100}, {"ItemType": "W2", "ItemCount": 1}]},
                {"uniqueName": "R3", "resultType": "/Lotus/Powersuits/Excalibur"},
            ]}),
        ),
    ]
}

fn write_exports(dir: &Path) {
    for (file, document) in export_documents() {
        std::fs::write(dir.join(file), serde_json::to_vec_pretty(&document).unwrap()).unwrap();
    }
}

fn config_for(data_dir: &Path, host: Option<&str>) -> PipelineConfig {
    let mut config = PipelineConfig {
        data_dir: data_dir.to_path_buf(),
        ..PipelineConfig::default()
    };
    if let Some(host) = host {
        config.fetch = FetchConfig {
            index_base_url: format!("{host}/PublicExport"),
            manifest_base_url: format!("{host}/PublicExport/Manifest"),
            timeout_secs: 5,
            ..FetchConfig::default()
        };
    }
    config
}

fn node(label: NodeLabel, key: &str) -> NodeRef {
    NodeRef::new(label, key)
}

// ============================================================================
// Full run
// ============================================================================

#[tokio::test]
async fn full_run_downloads_and_materializes() {
    let ids = [
        "ExportResources_en.json!abc",
        "ExportWeapons_en.json!def",
        "ExportRecipes_en.json!123",
        "ExportUpgrades_en.json!gone",
    ];
    let mut index = lzma_frame(format!("{}\n", ids.join("\n")).as_bytes());
    index.extend_from_slice(&[0xFF; 7]);

    let mut routes = HashMap::from([("/PublicExport/index_en.txt.lzma".to_string(), index)]);
    for ((file, document), id) in export_documents().into_iter().zip(ids) {
        assert!(id.starts_with(file));
        routes.insert(
            format!("/PublicExport/Manifest/{id}"),
            serde_json::to_vec(&document).unwrap(),
        );
    }
    let host = serve(routes).await;

    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data_raw");
    let config = config_for(&data_dir, Some(&host));
    let graph = MemoryGraph::new();

    let report = run(&graph, &config, IngestOptions::default(), || unreachable!())
        .await
        .unwrap();

    assert_eq!(report.download.manifests, 4);
    assert_eq!(report.download.report.saved.len(), 3);
    assert_eq!(report.download.report.failed.len(), 1);
    assert!(data_dir.join("index_en.txt").exists());
    assert!(data_dir.join("ExportWeapons_en.json").exists());

    let ingest = &report.ingest;
    assert!(!ingest.cleared);
    assert_eq!(ingest.rejected.len(), 1);
    assert!(ingest.skipped_manifests.is_empty());
    assert_eq!(ingest.resources.upserted, 2);
    assert_eq!(ingest.weapons.categories, 2);
    assert_eq!(ingest.recipes.builds_weapon, 1);
    assert_eq!(ingest.recipes.builds_resource, 1);
    assert_eq!(ingest.recipes.unresolved_builds, 1);
    assert_eq!(ingest.recipes.requires, 2);
    assert_eq!(ingest.recipes.unresolved_ingredients, 1);

    let summary = &ingest.summary;
    assert_eq!(summary.node_count("Resource"), 2);
    assert_eq!(summary.node_count("Weapon"), 2);
    assert_eq!(summary.node_count("Recipe"), 3);
    assert_eq!(summary.node_count("Category"), 2);
    assert_eq!(summary.edge_count("BUILDS"), 2);
    assert_eq!(summary.edge_count("REQUIRES"), 2);
    assert_eq!(summary.edge_count("BELONGS_TO"), 2);

    assert_eq!(
        graph.edge(
            EdgeKind::Builds,
            &node(NodeLabel::Recipe, "R1"),
            &node(NodeLabel::Weapon, "W1")
        ),
        Some(Some(2))
    );
    assert_eq!(
        graph.edge(
            EdgeKind::Requires,
            &node(NodeLabel::Recipe, "R2"),
            &node(NodeLabel::Resource, "Res1")
        ),
        Some(Some(100))
    );

    let braton = graph.node(&node(NodeLabel::Weapon, "W2")).unwrap();
    assert_eq!(braton["newStat"].as_str(), Some(r#"{"a":1}"#));
}

#[tokio::test]
async fn unreachable_index_aborts_the_run() {
    let host = serve(HashMap::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), Some(&host));
    let graph = MemoryGraph::new();

    let result = run(&graph, &config, IngestOptions::default(), || true).await;
    assert!(matches!(result, Err(wfgraph_ingest::IngestError::Fetch(_))));
    assert_eq!(graph.summary().await.unwrap().node_count("Resource"), 0);
}

// ============================================================================
// Ingest from local files
// ============================================================================

#[tokio::test]
async fn ingest_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_exports(dir.path());
    let config = config_for(dir.path(), None);
    let graph = MemoryGraph::new();

    let first = ingest(&graph, &config, IngestOptions::default(), || false)
        .await
        .unwrap();
    let before = graph.snapshot();
    let second = ingest(&graph, &config, IngestOptions::default(), || false)
        .await
        .unwrap();

    assert_eq!(first.summary, second.summary);
    assert_eq!(before, graph.snapshot());
}

#[tokio::test]
async fn clear_runs_only_when_confirmed() {
    let dir = tempfile::tempdir().unwrap();
    write_exports(dir.path());
    let config = config_for(dir.path(), None);
    let stale = node(NodeLabel::Resource, "Stale");
    let options = IngestOptions { clear_first: true };

    let graph = MemoryGraph::new();
    graph.upsert_node(&stale, &PropertyMap::new()).await.unwrap();
    let declined = ingest(&graph, &config, options, || false).await.unwrap();
    assert!(!declined.cleared);
    assert!(graph.contains_node(&stale));

    let mut asked = 0;
    let confirmed = ingest(&graph, &config, options, || {
        asked += 1;
        true
    })
    .await
    .unwrap();
    assert_eq!(asked, 1);
    assert!(confirmed.cleared);
    assert!(!graph.contains_node(&stale));
    assert_eq!(confirmed.summary.node_count("Resource"), 2);
}

#[tokio::test]
async fn missing_manifests_leave_their_pass_empty() {
    let dir = tempfile::tempdir().unwrap();
    let documents = export_documents();
    let (file, document) = &documents[0];
    std::fs::write(dir.path().join(file), document.to_string()).unwrap();
    let config = config_for(dir.path(), None);
    let graph = MemoryGraph::new();

    let report = ingest(&graph, &config, IngestOptions::default(), || false)
        .await
        .unwrap();

    assert_eq!(report.resources.upserted, 2);
    assert_eq!(report.skipped_manifests.len(), 2);
    assert!(report
        .skipped_manifests
        .iter()
        .all(|e| matches!(e, ManifestLoadError::Missing { .. })));
    assert_eq!(report.summary.node_count("Weapon"), 0);
}

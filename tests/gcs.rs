use std::io::Write;
use std::sync::Mutex;

use corpus_indexer::config::{Config, DEFAULT_SUFFIX};
use corpus_indexer::error::IngestError;
use corpus_indexer::ingest::{Ingestor, Input};
use corpus_indexer::locator::{classify, classify_root, ArchiveAddress};
use corpus_indexer::models::Document;
use corpus_indexer::storage::Storage;
use corpus_indexer::traits::IndexBuilder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Collect(Vec<Document>);

impl IndexBuilder for Collect {
    fn add(&mut self, document: Document) -> anyhow::Result<()> {
        self.0.push(document);
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.gcs.endpoint_url = server.uri();
    config.gcs.anonymous = true;
    config
}

/// Credential resolution reads process-wide environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const METADATA_HOST_VAR: &str = "GCE_METADATA_HOST";
const EMULATOR_HOST_VAR: &str = "STORAGE_EMULATOR_HOST";

/// Run `f` with the credential variables set as given, then clear them.
fn with_env<T>(vars: Vec<(&'static str, Option<String>)>, f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    for (key, value) in &vars {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    let out = f();
    for (key, _) in &vars {
        std::env::remove_var(key);
    }
    out
}

fn authenticated_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.gcs.endpoint_url = server.uri();
    config
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/corpora/o"))
        .and(query_param("prefix", "v2/"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "storage#objects",
            "nextPageToken": "page-2",
            "items": [
                {"name": "v2/python_0001.jsonl.gz", "size": "10"},
                {"name": "v2/README.md", "size": "10"}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/corpora/o"))
        .and(query_param("prefix", "v2/"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "storage#objects",
            "items": [
                {"name": "v2/go_0001.jsonl.gz", "size": "10"}
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_follows_pages_and_filters_suffix() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    let config = config_for(&server);

    let addresses = tokio::task::spawn_blocking(move || {
        let storage = Storage::new(&config);
        let root = classify_root("gs://corpora/v2").unwrap();
        storage.enumerate(&root, DEFAULT_SUFFIX)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(
        addresses,
        vec![
            ArchiveAddress::Remote {
                bucket: "corpora".to_string(),
                key: "v2/python_0001.jsonl.gz".to_string(),
            },
            ArchiveAddress::Remote {
                bucket: "corpora".to_string(),
                key: "v2/go_0001.jsonl.gz".to_string(),
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_archive_is_streamed_into_builder() {
    let server = MockServer::start().await;
    let body = concat!(
        r#"{"content": "fn main() {}", "repository": "acme/cli", "file_path": "src/main.rs"}"#,
        "\n",
        r#"{"content": "pub mod io;", "repository": "acme/cli", "file_path": "src/lib.rs"}"#,
        "\n",
    );

    Mock::given(method("GET"))
        .and(path("/storage/v1/b/corpora/o/v2%2Frust_0001.jsonl.gz"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(body.as_bytes())))
        .expect(1)
        .mount(&server)
        .await;
    let config = config_for(&server);

    let (summary, documents) = tokio::task::spawn_blocking(move || {
        let storage = Storage::new(&config);
        let mut collect = Collect::default();
        let summary = Ingestor::new(&storage, &mut collect, DEFAULT_SUFFIX)
            .run(&Input::File("gs://corpora/v2/rust_0001.jsonl.gz".to_string()))
            .unwrap();
        (summary, collect.0)
    })
    .await
    .unwrap();

    assert_eq!(summary.archives, 1);
    assert_eq!(summary.documents, 2);
    assert_eq!(documents[0].name, "acme/cli/src/main.rs");
    assert_eq!(documents[1].content, b"pub mod io;".to_vec());
    assert!(documents.iter().all(|d| d.language == "rust"));
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_object_reports_open_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("No such object"))
        .mount(&server)
        .await;
    let config = config_for(&server);

    let err = tokio::task::spawn_blocking(move || {
        let storage = Storage::new(&config);
        Ingestor::new(&storage, Collect::default(), DEFAULT_SUFFIX)
            .run(&Input::File("gs://corpora/missing.jsonl.gz".to_string()))
            .unwrap_err()
    })
    .await
    .unwrap();

    match &err {
        IngestError::OpenFailed { address, source } => {
            assert_eq!(address, "gs://corpora/missing.jsonl.gz");
            assert!(format!("{:#}", source).contains("404"), "{:#}", source);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_error_reports_enumeration_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/private/o"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;
    let config = config_for(&server);

    let err = tokio::task::spawn_blocking(move || {
        let storage = Storage::new(&config);
        let root = classify_root("gs://private").unwrap();
        storage.enumerate(&root, DEFAULT_SUFFIX).unwrap_err()
    })
    .await
    .unwrap();

    assert!(
        matches!(&err, IngestError::EnumerationFailed { root, .. } if root == "gs://private/"),
        "{err:?}"
    );
}

async fn mount_object(server: &MockServer, key: &str, token: &str, times: u64) {
    let body = r#"{"content": "x", "repository": "acme/cli", "file_path": "a.rs"}"#;
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/corpora/o/{}", key)))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(body.as_bytes())))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_metadata_token(server: &MockServer, expires_in: u64, times: u64) {
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/service-accounts/default/token"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "metadata-token",
            "expires_in": expires_in,
            "token_type": "Bearer"
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Open `keys` in order through one `Storage`, so credentials are shared.
fn open_all(config: Config, keys: &[&str]) -> Result<(), IngestError> {
    let storage = Storage::new(&config);
    for key in keys {
        let address = classify(&format!("gs://corpora/{}", key))?;
        storage.open(&address)?;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn access_token_from_env_is_sent_as_bearer() {
    let server = MockServer::start().await;
    mount_object(&server, "rust_1.jsonl.gz", "env-token", 1).await;
    let config = authenticated_config(&server);

    let summary = tokio::task::spawn_blocking(move || {
        with_env(
            vec![
                (EMULATOR_HOST_VAR, None),
                (TOKEN_VAR, Some("env-token".to_string())),
            ],
            || {
                let storage = Storage::new(&config);
                Ingestor::new(&storage, Collect::default(), DEFAULT_SUFFIX)
                    .run(&Input::File("gs://corpora/rust_1.jsonl.gz".to_string()))
            },
        )
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.documents, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn metadata_token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;
    mount_metadata_token(&server, 3600, 1).await;
    mount_object(&server, "a_1.jsonl.gz", "metadata-token", 1).await;
    mount_object(&server, "b_1.jsonl.gz", "metadata-token", 1).await;
    let config = authenticated_config(&server);
    let metadata_host = server.address().to_string();

    tokio::task::spawn_blocking(move || {
        with_env(
            vec![
                (EMULATOR_HOST_VAR, None),
                (TOKEN_VAR, None),
                (METADATA_HOST_VAR, Some(metadata_host)),
            ],
            || open_all(config, &["a_1.jsonl.gz", "b_1.jsonl.gz"]),
        )
    })
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn metadata_token_near_expiry_is_refreshed() {
    let server = MockServer::start().await;
    mount_metadata_token(&server, 30, 2).await;
    mount_object(&server, "a_1.jsonl.gz", "metadata-token", 1).await;
    mount_object(&server, "b_1.jsonl.gz", "metadata-token", 1).await;
    let config = authenticated_config(&server);
    let metadata_host = server.address().to_string();

    tokio::task::spawn_blocking(move || {
        with_env(
            vec![
                (EMULATOR_HOST_VAR, None),
                (TOKEN_VAR, None),
                (METADATA_HOST_VAR, Some(metadata_host)),
            ],
            || open_all(config, &["a_1.jsonl.gz", "b_1.jsonl.gz"]),
        )
    })
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn metadata_token_error_fails_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/service-accounts/default/token"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let config = authenticated_config(&server);
    let metadata_host = server.address().to_string();

    let err = tokio::task::spawn_blocking(move || {
        with_env(
            vec![
                (EMULATOR_HOST_VAR, None),
                (TOKEN_VAR, None),
                (METADATA_HOST_VAR, Some(metadata_host)),
            ],
            || open_all(config, &["a_1.jsonl.gz"]),
        )
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, IngestError::OpenFailed { .. }), "{err:?}");
}

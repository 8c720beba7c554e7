//! Integration tests for the collection pipeline.
//!
//! These tests use wiremock to stand in for a portal and drive the full
//! stack end-to-end: real HTTP session, executor, harvester, and the
//! files it leaves on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use liferake::client::auth;
use liferake::harvest::output::OutputDir;
use liferake::harvest::resources::{PageSizes, Selection};
use liferake::harvest::{HarvestError, Harvester};
use liferake::{Credentials, HttpSession, RequestExecutor, ThreadSleeper};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE_ID: &str = "20121";
const CONTENTS_PATH: &str = "/o/headless-delivery/v1.0/sites/20121/structured-contents";

fn page_payload(ids: std::ops::RangeInclusive<u64>, total: u64, last: u64, page: u64) -> Value {
    let items: Vec<Value> = ids
        .map(|id| json!({"id": id, "title": format!("item {}", id)}))
        .collect();
    json!({
        "items": items,
        "totalCount": total,
        "lastPage": last,
        "page": page,
    })
}

async fn mount_site_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/o/headless-delivery/v1.0/sites/20121"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 20121})))
        .mount(server)
        .await;
}

/// Builds the real blocking pipeline against `base_url` and runs it.
/// Must be called from a blocking context.
fn collect(
    base_url: &str,
    data_dir: &Path,
    selection: Selection,
    credentials: Option<Credentials>,
    max_retries: u32,
) -> Result<(), HarvestError> {
    let session = HttpSession::builder(base_url)
        .timeout_secs(5)
        .build()
        .expect("session should build");
    let mut executor = RequestExecutor::new(session, credentials, max_retries, ThreadSleeper);
    executor.authenticate();
    let mut harvester = Harvester::new(
        executor,
        SITE_ID,
        OutputDir::new(data_dir),
        PageSizes::default(),
        Duration::ZERO,
        true,
    );
    harvester.run(selection)
}

fn read_json(path: PathBuf) -> Value {
    let raw = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    serde_json::from_str(&raw).expect("file should hold valid JSON")
}

#[tokio::test(flavor = "multi_thread")]
async fn paginated_listing_is_walked_in_order() {
    let server = MockServer::start().await;
    mount_site_probe(&server).await;
    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .and(query_param("page", "1"))
        .and(query_param("pageSize", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_payload(1..=20, 45, 3, 1)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_payload(21..=40, 45, 3, 2)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_payload(41..=45, 45, 3, 3)))
        .expect(1)
        .mount(&server)
        .await;

    let base_url = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let selection = Selection {
        structured_contents: true,
        ..Selection::default()
    };
    let worker_dir = data_dir.clone();
    tokio::task::spawn_blocking(move || collect(&base_url, &worker_dir, selection, None, 3))
        .await
        .unwrap()
        .unwrap();

    let dataset = read_json(data_dir.join("structured_contents.json"));
    let items = dataset.as_array().expect("dataset should be an array");
    assert_eq!(items.len(), 45);
    let ids: Vec<u64> = items.iter().filter_map(|i| i["id"].as_u64()).collect();
    assert_eq!(ids, (1..=45).collect::<Vec<u64>>());

    let requests = server.received_requests().await.unwrap();
    let pages: Vec<String> = requests
        .iter()
        .filter(|r| r.url.path() == CONTENTS_PATH)
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(name, _)| name.as_ref() == "page")
                .map(|(_, value)| value.to_string())
        })
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_writes_datasets_and_summary() {
    let server = MockServer::start().await;
    mount_site_probe(&server).await;
    // Token discovery scans the front page.
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<script>var csrf = "e2eT0kenValue123";</script>"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_payload(1..=2, 2, 1, 1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/o/headless-delivery/v1.0/sites/20121/structured-content-folders",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [], "totalCount": 0, "lastPage": 1, "page": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/headless-delivery/v1.0/sites/20121/site-pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_payload(7..=7, 1, 1, 1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/headless-delivery/v1.0/sites/20121/document-folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 101, "name": "Reports & Stuff"}, {"id": 102}],
            "totalCount": 2, "lastPage": 1, "page": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/headless-delivery/v1.0/document-folders/101/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": 9001, "title": "Doc A"},
                {"id": 9002, "title": "Doc B"},
                {"id": 9003, "title": "Doc C"}
            ],
            "totalCount": 3, "lastPage": 1, "page": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/headless-delivery/v1.0/document-folders/102/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [], "totalCount": 0, "lastPage": 1, "page": 1
        })))
        .mount(&server)
        .await;

    let base_url = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let worker_dir = data_dir.clone();
    tokio::task::spawn_blocking(move || {
        collect(&base_url, &worker_dir, Selection::all(), None, 3)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(
        read_json(data_dir.join("structured_contents.json"))
            .as_array()
            .unwrap()
            .len(),
        2
    );
    assert!(!data_dir.join("content_folders.json").exists());
    assert_eq!(
        read_json(data_dir.join("site_pages.json")).as_array().unwrap().len(),
        1
    );
    assert_eq!(
        read_json(data_dir.join("document_folders.json"))
            .as_array()
            .unwrap()
            .len(),
        2
    );

    let documents = read_json(data_dir.join("all_documents.json"));
    let documents = documents.as_array().unwrap();
    assert_eq!(documents.len(), 3);
    for document in documents {
        assert_eq!(document["source_folder"]["id"], 101);
        assert_eq!(document["source_folder"]["name"], "Reports & Stuff");
    }
    assert!(data_dir.join("documents_folder_101_Reports___Stuff.json").exists());
    assert!(!data_dir.join("documents_folder_102_folder_102.json").exists());

    let summary = read_json(data_dir.join("summary_report.json"));
    assert_eq!(summary["statistics"]["structured_contents"], 2);
    assert_eq!(summary["statistics"]["content_folders"], 0);
    assert_eq!(summary["statistics"]["site_pages"], 1);
    assert_eq!(summary["statistics"]["document_folders"], 2);
    assert_eq!(summary["statistics"]["documents"], 3);
    assert_eq!(summary["statistics"]["errors"], 0);
    assert_eq!(summary["configuration"]["site_id"], SITE_ID);
    assert_eq!(summary["configuration"]["csrf_token_obtained"], true);
    assert_eq!(summary["configuration"]["verify_ssl"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_listing_is_counted_in_the_summary() {
    let server = MockServer::start().await;
    mount_site_probe(&server).await;
    Mock::given(method("GET"))
        .and(path("/o/headless-delivery/v1.0/sites/20121/site-pages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let base_url = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let selection = Selection {
        site_pages: true,
        ..Selection::default()
    };
    let worker_dir = data_dir.clone();
    tokio::task::spawn_blocking(move || collect(&base_url, &worker_dir, selection, None, 1))
        .await
        .unwrap()
        .unwrap();

    assert!(!data_dir.join("site_pages.json").exists());
    let summary = read_json(data_dir.join("summary_report.json"));
    assert_eq!(summary["statistics"]["site_pages"], 0);
    assert_eq!(summary["statistics"]["errors"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_api_fails_the_run() {
    let server = MockServer::start().await;

    let base_url = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let worker_dir = data_dir.clone();
    let result =
        tokio::task::spawn_blocking(move || collect(&base_url, &worker_dir, Selection::all(), None, 1))
            .await
            .unwrap();
    assert!(matches!(result, Err(HarvestError::NoApiAccess)));
    assert!(!data_dir.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn basic_auth_wins_when_the_identity_probe_accepts_it() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jsonws/user/get-current-user"))
        .and(header("authorization", "Basic amRvZTpodW50ZXIy"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"screenName": "jdoe", "userId": 42})),
        )
        .mount(&server)
        .await;

    let base_url = server.uri();
    let winner = tokio::task::spawn_blocking(move || {
        let mut session = HttpSession::builder(&base_url).build().expect("session");
        auth::authenticate(
            &mut session,
            &Credentials {
                username: "jdoe".to_string(),
                password: "hunter2".to_string(),
            },
        )
    })
    .await
    .unwrap();
    assert_eq!(winner, Some("basic"));
}

#[tokio::test(flavor = "multi_thread")]
async fn form_login_fallback_succeeds_when_basic_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jsonws/user/get-current-user"))
        .respond_with(ResponseTemplate::new(401).set_body_string("auth required"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c/portal/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form action="/c/portal/login?p_auth=aB3dE5fG" method="post"></form>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/c/portal/login"))
        .and(body_string_contains("login=jdoe"))
        .and(body_string_contains("p_auth=aB3dE5fG"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>welcome back</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let base_url = server.uri();
    let winner = tokio::task::spawn_blocking(move || {
        let mut session = HttpSession::builder(&base_url).build().expect("session");
        auth::authenticate(
            &mut session,
            &Credentials {
                username: "jdoe".to_string(),
                password: "hunter2".to_string(),
            },
        )
    })
    .await
    .unwrap();
    assert_eq!(winner, Some("form-login"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rerunning_a_collection_rewrites_identical_datasets() {
    let server = MockServer::start().await;
    mount_site_probe(&server).await;
    Mock::given(method("GET"))
        .and(path(CONTENTS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_payload(1..=3, 3, 1, 1)))
        .mount(&server)
        .await;

    let base_url = server.uri();
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let selection = Selection {
        structured_contents: true,
        ..Selection::default()
    };
    let worker_url = base_url.clone();
    let worker_dir = data_dir.clone();
    tokio::task::spawn_blocking(move || collect(&worker_url, &worker_dir, selection, None, 3))
        .await
        .unwrap()
        .unwrap();
    let first = fs::read(data_dir.join("structured_contents.json")).unwrap();

    // A second pass over unchanged data must not grow or reorder the file.
    let worker_dir = data_dir.clone();
    tokio::task::spawn_blocking(move || collect(&base_url, &worker_dir, selection, None, 3))
        .await
        .unwrap()
        .unwrap();
    let second = fs::read(data_dir.join("structured_contents.json")).unwrap();
    assert_eq!(first, second);
}

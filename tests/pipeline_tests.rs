//! End-to-end pipeline tests: harvest from a mock server, enrich against a
//! reference table loaded from disk, export to CSV — plus the bounded
//! quarantine purge.

use rep365::api::ApiClient;
use rep365::config::RateLimitConfig;
use rep365::error::Rep365Error;
use rep365::export::{CsvExporter, SinkMode};
use rep365::harvest::schema::{FieldKind, RecordSchema};
use rep365::harvest::Harvester;
use rep365::join::{JoinMode, Joiner, ReferenceTable};
use rep365::remediate::purge_collection;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rate() -> RateLimitConfig {
    RateLimitConfig {
        requests: 1000,
        window_secs: 60,
    }
}

fn write_reference_table(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("subnets.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "subnet,name").unwrap();
    writeln!(file, "10.120.26.0/24,SCCM Production").unwrap();
    writeln!(file, "10.120.27.0,SCCM Staging").unwrap();
    path
}

fn device_schema() -> RecordSchema {
    RecordSchema::new()
        .field("id", FieldKind::Text)
        .field("computerDnsName", FieldKind::Text)
        .optional_field("ipAddresses", FieldKind::List)
}

#[tokio::test]
async fn test_harvest_join_export_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "m-1", "computerDnsName": "ws-1", "ipAddresses": ["10.120.26.55"]},
                {"id": "m-2", "computerDnsName": "ws-2", "ipAddresses": ["10.120.27.1"]},
                {"id": "m-3", "computerDnsName": "ws-3", "ipAddresses": ["172.16.0.9"]},
            ],
            "totalCount": 3
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), "test-token");
    // Bare reference addresses pick up the default /24
    let table = ReferenceTable::load(&write_reference_table(dir.path()), 24).unwrap();
    let joiner = Joiner::new(&table, vec!["ipAddresses".to_string()], JoinMode::Enrich);

    let output = dir.path().join("devices.csv");
    let mut exporter = CsvExporter::new(&output, SinkMode::Overwrite);

    let mut harvester = Harvester::new(&client, "machines", device_schema(), 10, rate());
    while let Some(record) = harvester.next().await.unwrap() {
        for row in joiner.enrich(&record).unwrap() {
            exporter.write(&row).unwrap();
        }
    }
    let summary = exporter.finish().unwrap();
    assert_eq!(summary.records, 3);

    let contents = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(
        lines[0],
        "id,computerDnsName,ipAddresses,address,subnet,subnet_name"
    );
    assert_eq!(
        lines[1],
        "m-1,ws-1,10.120.26.55,10.120.26.55,10.120.26.0/24,SCCM Production"
    );
    assert_eq!(
        lines[2],
        "m-2,ws-2,10.120.27.1,10.120.27.1,10.120.27.0/24,SCCM Staging"
    );
    assert_eq!(lines[3], "m-3,ws-3,172.16.0.9,172.16.0.9,No Match,No Match");
}

#[tokio::test]
async fn test_pipeline_with_ceiling_splits_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/machines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": (1..=5).map(|i| json!({
                "id": format!("m-{}", i),
                "computerDnsName": format!("ws-{}", i),
                "ipAddresses": ["10.120.26.5"],
            })).collect::<Vec<_>>(),
            "totalCount": 5
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), "test-token");
    let table = ReferenceTable::load(&write_reference_table(dir.path()), 24).unwrap();
    let joiner = Joiner::new(&table, vec!["ipAddresses".to_string()], JoinMode::Enrich);

    let output = dir.path().join("devices.csv");
    let mut exporter = CsvExporter::new(&output, SinkMode::Overwrite).ceiling(2);

    let mut harvester = Harvester::new(&client, "machines", device_schema(), 10, rate());
    while let Some(record) = harvester.next().await.unwrap() {
        for row in joiner.enrich(&record).unwrap() {
            exporter.write(&row).unwrap();
        }
    }
    let summary = exporter.finish().unwrap();

    // No record lost or duplicated across the split
    assert_eq!(summary.records, 5);
    assert_eq!(summary.files.len(), 3);

    let mut all_ids = Vec::new();
    for (i, file) in summary.files.iter().enumerate() {
        assert_eq!(
            file.file_name().unwrap().to_string_lossy(),
            format!("devices_{}.csv", i + 1)
        );
        let mut reader = csv::Reader::from_path(file).unwrap();
        assert_eq!(reader.headers().unwrap().get(0).unwrap(), "id");
        for row in reader.records() {
            all_ids.push(row.unwrap().get(0).unwrap().to_string());
        }
    }
    assert_eq!(all_ids, vec!["m-1", "m-2", "m-3", "m-4", "m-5"]);
}

#[test]
fn test_reference_table_missing_file_is_load_error() {
    let err = ReferenceTable::load(Path::new("/nonexistent/subnets.csv"), 24).unwrap_err();
    assert!(matches!(err, Rep365Error::ReferenceLoad(_)));
}

#[test]
fn test_reference_table_missing_column_is_load_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "cidr,label\n10.0.0.0/24,Prod\n").unwrap();

    let err = ReferenceTable::load(&path, 24).unwrap_err();
    assert!(matches!(err, Rep365Error::ReferenceLoad(_)));
}

#[tokio::test]
async fn test_purge_converges_when_collection_drains() {
    let server = MockServer::start().await;

    // First listing returns two items, later listings are empty
    Mock::given(method("GET"))
        .and(path("/quarantine/messages"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "q-1"}, {"id": "q-2"}],
            "totalCount": 2
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quarantine/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "totalCount": 0
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/quarantine/messages/q-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/quarantine/messages/q-2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), "test-token");
    let outcome = purge_collection(&client, "quarantine/messages", 100, 10, |_, _| {})
        .await
        .unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.deleted, 2);
    assert_eq!(outcome.remaining, 0);
    assert_eq!(outcome.iterations, 2);
}

#[tokio::test]
async fn test_purge_stops_without_progress() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quarantine/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "q-1"}],
            "totalCount": 1
        })))
        .mount(&server)
        .await;
    // The delete never succeeds, so no iteration can make progress
    Mock::given(method("DELETE"))
        .and(path("/quarantine/messages/q-1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "Forbidden", "message": "No quarantine role"}
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), "test-token");
    let mut item_errors = 0;
    let err = purge_collection(&client, "quarantine/messages", 100, 10, |_, _| {
        item_errors += 1;
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Rep365Error::NoProgress(_)));
    assert_eq!(item_errors, 1);
}

#[tokio::test]
async fn test_purge_respects_iteration_cap() {
    let server = MockServer::start().await;

    // The collection always lists one deletable item: a remote side that
    // never reaches empty
    Mock::given(method("GET"))
        .and(path("/quarantine/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "q-1"}],
            "totalCount": 1
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/quarantine/messages/q-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), "test-token");
    let outcome = purge_collection(&client, "quarantine/messages", 100, 3, |_, _| {})
        .await
        .unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.deleted, 3);
    assert_eq!(outcome.remaining, 1);
}

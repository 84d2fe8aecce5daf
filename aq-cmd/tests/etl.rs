//! End-to-end runs of the ETL cycle against a mocked datastore.

use aq_cmd::etl::run_sources;
use aq_cmd::EtlOptions;
use aq_core::api::{ApiClient, RetryPolicy};
use aq_core::reading::Reading;
use aq_core::source::ApiSource;
use aq_db::run_log::RunStatus;
use aq_db::Database;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/api/3/action/datastore_search";

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn body(records: Value) -> Value {
    json!({ "success": true, "result": { "records": records } })
}

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(
        &format!("{}{}", server.uri(), SEARCH_PATH),
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
        },
    )
    .unwrap()
}

fn source(resource_id: &str, station: &str) -> ApiSource {
    ApiSource {
        resource_id: resource_id.to_string(),
        station: station.to_string(),
    }
}

fn options() -> EtlOptions {
    EtlOptions {
        limit: 100,
        max_gap_hours: 6,
        ..EtlOptions::default()
    }
}

async fn mount_latest(server: &MockServer, resource_id: &str, latest: &str) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("resource_id", resource_id))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(body(json!([{ "Fecha & Hora": latest }]))),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn failing_source_does_not_stop_its_siblings() {
    let server = MockServer::start().await;
    mount_latest(&server, "res-pance", "2024-01-01T03:00:00").await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("resource_id", "res-pance"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([
            {"_id": 2, "Fecha & Hora": "2024-01-01T03:00:00", "PM2.5": "16", "PM10": "70"},
            {"_id": 1, "Fecha & Hora": "2024-01-01T00:00:00", "PM2.5": "10", "PM10": "40"}
        ]))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("resource_id", "res-flora"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = Database::open_in_memory().unwrap();
    let client = client_for(&server);
    let sources = vec![source("res-flora", "Flora"), source("res-pance", "Pance")];

    let entries = run_sources(&db, &client, &sources, &options()).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].source, "Flora");
    assert_eq!(entries[0].status, RunStatus::Error);
    assert_eq!(entries[0].inserted, 0);
    assert!(entries[0].message.contains("500"));

    assert_eq!(entries[1].status, RunStatus::Success);
    assert_eq!(entries[1].inserted, 8);

    let station = db.find_station("Pance").unwrap().unwrap();
    let pm25 = db.find_pollutant("PM2.5").unwrap().unwrap();
    let series = db
        .query_measurements(station.station_id, pm25.pollutant_id, None)
        .unwrap();
    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![10.0, 12.0, 14.0, 16.0]);
    assert_eq!(series.iter().filter(|p| p.imputed).count(), 2);
    assert_eq!(db.query_aqi(station.station_id, None).unwrap().len(), 4);

    // Nothing newer upstream: the full fetch is not repeated.
    let again = run_sources(&db, &client, &sources[1..], &options()).await;
    assert_eq!(again[0].status, RunStatus::NoNewData);
    assert_eq!(again[0].inserted, 0);

    let log = db.query_run_log(10).unwrap();
    assert_eq!(log.len(), 3);
    assert!(log.iter().any(|e| e.status == RunStatus::Error && e.source == "Flora"));
}

#[tokio::test]
async fn incremental_fetch_starts_at_the_stored_watermark() {
    let server = MockServer::start().await;
    mount_latest(&server, "res-pance", "2024-01-01T05:00:00").await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("resource_id", "res-pance"))
        .and(query_param("limit", "100"))
        .and(query_param(
            "filters",
            r#"{"Fecha & Hora":{"$gte":"2024-01-01T03:00:00"}}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([
            {"Fecha & Hora": "2024-01-01T05:00:00", "PM10": "50"},
            {"Fecha & Hora": "2024-01-01T03:00:00", "PM10": "30"}
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let db = Database::open_in_memory().unwrap();
    db.load_measurements(&[Reading::observed("Pance", at(3), "PM10", None, 30.0)])
        .unwrap();

    let entries = run_sources(
        &db,
        &client_for(&server),
        &[source("res-pance", "Pance")],
        &options(),
    )
    .await;

    assert_eq!(entries[0].status, RunStatus::Success);
    assert_eq!(entries[0].inserted, 2);
    assert_eq!(entries[0].skipped, 1);
    assert_eq!(db.latest_measurement_time("Pance").unwrap(), Some(at(5)));
}

#[tokio::test]
async fn empty_upstream_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let db = Database::open_in_memory().unwrap();
    let entries = run_sources(
        &db,
        &client_for(&server),
        &[source("res-empty", "Univalle")],
        &options(),
    )
    .await;
    assert_eq!(entries[0].status, RunStatus::NoNewData);
    assert_eq!(db.query_run_log(1).unwrap()[0].source, "Univalle");
}

//! Pipeline complet contre des APIs simulées (wiremock)

use std::time::Duration;

use geo_pipeline::dataset::snapshot;
use geo_pipeline::pipeline::{clean, enrich, geocode};
use geo_pipeline::{Dataset, Grade, NumericStrategy, QualityAnalyzer, QualityThresholds, Value};
use geoapi::{AdresseFetcher, ApiConfig, CommuneFetcher, FetchError, Fetcher, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    }
}

fn api(server: &MockServer) -> ApiConfig {
    ApiConfig::new("mock", server.uri()).with_timeout(Duration::from_secs(2))
}

async fn mount_address(server: &MockServer, query: &str, label: &str, score: f64, citycode: &str) {
    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("q", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [5.72, 45.18]},
                "properties": {
                    "label": label,
                    "score": score,
                    "postcode": "38000",
                    "citycode": citycode,
                    "city": "Grenoble"
                }
            }]
        })))
        .mount(server)
        .await;
}

async fn ban_server() -> MockServer {
    let server = MockServer::start().await;
    mount_address(&server, "8 bd du port grenoble", "8 Boulevard du Port 38000 Grenoble", 0.95, "38185").await;
    mount_address(&server, "1 place verdun grenoble", "1 Place de Verdun 38000 Grenoble", 0.88, "38185").await;
    mount_address(&server, "rue floue", "Rue Floue", 0.31, "38185").await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("q", "nulle part"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"features": []})))
        .mount(&server)
        .await;
    server
}

fn addresses() -> Vec<String> {
    [
        "8 bd du port grenoble",
        "1 place verdun grenoble",
        "8 bd du port grenoble",
        "rue floue",
        "nulle part",
    ]
    .iter()
    .map(|a| a.to_string())
    .collect()
}

#[tokio::test]
async fn test_geocode_clean_and_grade() {
    let server = ban_server().await;
    let mut fetcher = AdresseFetcher::with_config(api(&server), fast_retry()).unwrap();

    let results = geocode(&mut fetcher, addresses(), 2).await.unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(results.iter().filter(|r| r.is_valid()).count(), 3);
    assert_eq!(fetcher.stats().items_fetched, 4);

    let (cleaned, log) = clean(
        Dataset::from_geocoding(&results),
        NumericStrategy::Median,
        "unknown",
        QualityThresholds::default().geocoding_score_min,
    )
    .unwrap();

    assert_eq!(cleaned.n_rows(), 4);
    assert!(log.summary().starts_with("• Doublons supprimés: 1"));
    assert_eq!(cleaned.value(0, "city"), Some(Value::Text("grenoble".into())));
    assert_eq!(cleaned.value(3, "is_geocoded"), Some(Value::Bool(false)));

    let metrics = QualityAnalyzer::new(cleaned).analyze().unwrap();
    assert_eq!(metrics.total_records, 4);
    assert_eq!(metrics.duplicates_count, 0);
    assert_eq!(metrics.completeness_score, 1.0);
    assert_eq!(metrics.geocoding_success_rate, 50.0);
    // 40 + 30 + 15
    assert_eq!(metrics.quality_grade, Grade::B);
}

#[tokio::test]
async fn test_enrich_with_communes() {
    let ban = ban_server().await;
    let geo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/communes/38185"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nom": "Grenoble",
            "code": "38185",
            "codeDepartement": "38",
            "codeRegion": "84",
            "population": 156389
        })))
        .expect(1)
        .mount(&geo)
        .await;

    let mut fetcher = AdresseFetcher::with_config(api(&ban), fast_retry()).unwrap();
    let results = geocode(&mut fetcher, addresses(), 10).await.unwrap();

    let mut communes = CommuneFetcher::with_config(api(&geo), fast_retry()).unwrap();
    let enriched = enrich(&mut communes, &results).await.unwrap();

    assert_eq!(enriched.len(), 3);
    assert!(enriched.iter().all(|e| e.population == 156_389));
    assert_eq!(communes.stats().requests_made, 1);

    let dataset = Dataset::from_enriched(&enriched);
    let dir = tempfile::tempdir().unwrap();
    let path = snapshot::write_snapshot(&dataset, dir.path(), "enriched").unwrap();
    let loaded = snapshot::load_dir(dir.path()).unwrap();
    assert_eq!(loaded.n_rows(), 3);
    assert_eq!(loaded.value(0, "commune"), Some(Value::Text("Grenoble".into())));
    assert!(path.exists());
}

#[tokio::test]
async fn test_geocode_aborts_on_api_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut fetcher = AdresseFetcher::with_config(api(&server), fast_retry()).unwrap();
    let err = geocode(&mut fetcher, addresses(), 10).await.unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 502, .. }));
    let stats = fetcher.stats();
    assert_eq!(stats.requests_made, 3);
    assert_eq!(stats.requests_failed, 1);
}

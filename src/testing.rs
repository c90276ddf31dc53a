use std::ops::Range;
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{Config, DatabaseConfig, GraphConfig};
use crate::db::SqliteDatabase;
use crate::graph::time;
use crate::listeners::GraphScraper;
use crate::services::ServicesContainer;

pub fn get_test_file_path<P: AsRef<str>>(name: P) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name.as_ref())
}

pub fn get_test_file_contents<P: AsRef<str>>(name: P) -> String {
    let path = get_test_file_path(name);
    std::fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read test file"))
}

pub fn mock_config(api_url: &str, access_token: Option<&str>) -> Config {
    Config {
        graph: GraphConfig {
            api_url: Some(api_url.to_string()),
            access_token: access_token.map(|t| t.to_string()),
            ..Default::default()
        },
        database: DatabaseConfig::default(),
    }
}

pub async fn mock_services(api_url: &str) -> ServicesContainer<SqliteDatabase> {
    ServicesContainer::new_mock(mock_config(api_url, None))
        .await
        .expect("the in-memory database should open")
}

pub fn mock_scraper(services: ServicesContainer<SqliteDatabase>) -> GraphScraper<ServicesContainer<SqliteDatabase>> {
    GraphScraper::new(services)
        .with_token("test-token")
        .expect("the test client should build")
}

/// The `created_time` of the `index`th newest post in generated pages.
pub fn post_time(index: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 10, 1, 12, 0, 0).unwrap() - chrono::Duration::hours(index as i64)
}

pub fn post_json(collection_id: &str, suffix: &str, created_time: DateTime<Utc>) -> Value {
    json!({
        "id": format!("{collection_id}_{suffix}"),
        "created_time": time::format(&created_time),
        "message": format!("Post {suffix}"),
        "permalink_url": format!("https://www.facebook.com/{collection_id}/posts/{suffix}"),
        "reactions_like": { "data": [], "summary": { "total_count": 10 } }
    })
}

/// A page of posts, newest first, numbered by their position in the feed.
pub fn posts_page(collection_id: &str, range: Range<usize>, next: Option<String>) -> Value {
    let data: Vec<Value> = range
        .map(|i| post_json(collection_id, &i.to_string(), post_time(i)))
        .collect();

    let paging = match next {
        Some(next) => json!({ "next": next }),
        None => json!({}),
    };

    json!({ "data": data, "paging": paging })
}

/// Mounts the lookups made when the `BillGates` page is scraped for the first time.
pub async fn mount_bill_gates(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/BillGates"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "216311481960", "name": "Bill Gates" })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/216311481960"))
        .and(query_param("metadata", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(get_test_file_contents("bill_gates_metadata_probe.json")),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/216311481960"))
        .and(query_param_is_missing("metadata"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(get_test_file_contents("bill_gates.json")),
        )
        .expect(1)
        .mount(server)
        .await;
}

//! Contract Test: Cloudflare API usage
//!
//! Runs the provider against a mock HTTP server.
//!
//! Constraints verified:
//! - Lookups filter by type and name and carry the bearer token
//! - Writes send the full field set (type, name, content, ttl, proxied)
//! - Error statuses and `success: false` envelopes become errors
//! - Dry-run mode performs lookups but never writes

use mockito::{Matcher, Server};
use npmdns_core::{DnsProvider, Error, RecordSettings};
use npmdns_provider_cloudflare::{CloudflareProvider, DRY_RUN_RECORD_ID};
use serde_json::json;
use std::net::Ipv4Addr;

const IP: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 7);

fn provider(server: &Server, dry_run: bool) -> CloudflareProvider {
    CloudflareProvider::new(
        "test-token",
        "zone123",
        server.url(),
        RecordSettings::default(),
        dry_run,
    )
    .expect("provider")
}

fn record(id: &str, name: &str, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "type": "A",
        "content": content,
        "ttl": 3600,
        "proxied": true,
    })
}

fn ok(result: serde_json::Value) -> String {
    json!({"success": true, "errors": [], "messages": [], "result": result}).to_string()
}

#[tokio::test]
async fn lookup_filters_by_type_and_name() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/zones/zone123/dns_records")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "A".into()),
            Matcher::UrlEncoded("name".into(), "www.example.com".into()),
        ]))
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok(json!([
            record("r1", "www.example.com", "198.51.100.1"),
            record("r2", "www.example.com", "203.0.113.7"),
        ])))
        .create_async()
        .await;

    let records = provider(&server, false)
        .find_a_records("www.example.com")
        .await
        .expect("lookup succeeds");

    mock.assert_async().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "r1");
    assert!(!records[0].points_to(IP));
    assert!(records[1].points_to(IP));
}

#[tokio::test]
async fn lookup_with_no_records_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/zones/zone123/dns_records")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(ok(json!([])))
        .create_async()
        .await;

    let records = provider(&server, false)
        .find_a_records("new.example.com")
        .await
        .expect("lookup succeeds");
    assert!(records.is_empty());
}

#[tokio::test]
async fn create_posts_full_record() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/zones/zone123/dns_records")
        .match_body(Matcher::Json(json!({
            "type": "A",
            "name": "new.example.com",
            "content": "203.0.113.7",
            "ttl": 3600,
            "proxied": true,
        })))
        .with_status(200)
        .with_body(ok(record("r9", "new.example.com", "203.0.113.7")))
        .create_async()
        .await;

    let created = provider(&server, false)
        .create_a_record("new.example.com", IP)
        .await
        .expect("create succeeds");

    mock.assert_async().await;
    assert_eq!(created.id, "r9");
    assert_eq!(created.content, "203.0.113.7");
}

#[tokio::test]
async fn update_puts_full_record() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/zones/zone123/dns_records/r1")
        .match_body(Matcher::PartialJson(json!({
            "type": "A",
            "name": "www.example.com",
            "content": "203.0.113.7",
        })))
        .with_status(200)
        .with_body(ok(record("r1", "www.example.com", "203.0.113.7")))
        .create_async()
        .await;

    let updated = provider(&server, false)
        .update_a_record("r1", "www.example.com", IP)
        .await
        .expect("update succeeds");

    mock.assert_async().await;
    assert!(updated.points_to(IP));
}

#[tokio::test]
async fn delete_removes_record() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/zones/zone123/dns_records/r1")
        .with_status(200)
        .with_body(ok(json!({"id": "r1"})))
        .create_async()
        .await;

    provider(&server, false)
        .delete_record("r1")
        .await
        .expect("delete succeeds");
    mock.assert_async().await;
}

#[tokio::test]
async fn server_error_is_reported() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/zones/zone123/dns_records/r1")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let err = provider(&server, false)
        .update_a_record("r1", "www.example.com", IP)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
    assert!(err.to_string().contains("transient"));
}

#[tokio::test]
async fn rate_limit_is_reported() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/zones/zone123/dns_records")
        .with_status(429)
        .create_async()
        .await;

    let err = provider(&server, false)
        .create_a_record("new.example.com", IP)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RateLimited(_)));
}

#[tokio::test]
async fn unsuccessful_envelope_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/zones/zone123/dns_records")
        .with_status(200)
        .with_body(
            json!({
                "success": false,
                "errors": [{"code": 81057, "message": "Record already exists."}],
                "messages": [],
                "result": null,
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = provider(&server, false)
        .create_a_record("new.example.com", IP)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Record already exists."));
}

#[tokio::test]
async fn dry_run_looks_up_but_never_writes() {
    let mut server = Server::new_async().await;
    let lookup = server
        .mock("GET", "/zones/zone123/dns_records")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(ok(json!([record("r1", "www.example.com", "198.51.100.1")])))
        .expect(1)
        .create_async()
        .await;
    let mut writes = Vec::new();
    for method in ["POST", "PUT", "DELETE"] {
        writes.push(
            server
                .mock(method, Matcher::Any)
                .expect(0)
                .create_async()
                .await,
        );
    }

    let provider = provider(&server, true);
    let existing = provider
        .find_a_records("www.example.com")
        .await
        .expect("lookup succeeds");

    let updated = provider
        .update_a_record(&existing[0].id, "www.example.com", IP)
        .await
        .expect("dry-run update succeeds");
    let created = provider
        .create_a_record("new.example.com", IP)
        .await
        .expect("dry-run create succeeds");
    provider.delete_record("r1").await.expect("dry-run delete succeeds");

    lookup.assert_async().await;
    for mock in &writes {
        mock.assert_async().await;
    }
    assert_eq!(updated.id, "r1");
    assert_eq!(created.id, DRY_RUN_RECORD_ID);
}

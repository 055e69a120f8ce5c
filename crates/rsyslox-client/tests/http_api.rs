use std::sync::Arc;

use rsyslox_client::{
    ApiError, Credential, HttpLogApi, LogApi, MetaValue, MetaValues, QueryParams, SessionProvider,
    SessionStore,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_with(server: &MockServer, credential: Option<Credential>) -> (HttpLogApi, SessionStore) {
    let session = SessionStore::new(credential);
    let api = HttpLogApi::new(server.uri(), Arc::new(session.clone()));
    (api, session)
}

#[tokio::test]
async fn query_logs_sends_repeated_filter_keys() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .and(query_param("limit", "15"))
        .and(header("X-API-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "offset": 0,
            "limit": 15,
            "rows": [
                {"ID": 2, "FromHost": "web1", "Severity": 3, "Message": "disk full"},
                {"ID": 1, "FromHost": "db1", "Severity": 4, "Message": "slow query"}
            ]
        })))
        .mount(&server)
        .await;

    let (api, _) = api_with(&server, Some(Credential::ApiKey("secret".to_string())));

    let mut params = QueryParams::new();
    params.push("limit", 15);
    params.push("offset", 0);
    params.push("Severity", 3);
    params.push("Severity", 4);

    let page = api.query_logs(&params).await.expect("query should succeed");
    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].host(), Some("web1"));

    let received = server
        .received_requests()
        .await
        .expect("should capture requests");
    assert_eq!(received.len(), 1);
    let severities: Vec<String> = received[0]
        .url
        .query_pairs()
        .filter(|(k, _)| k == "Severity")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(severities, vec!["3", "4"]);
}

#[tokio::test]
async fn http_error_uses_server_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "INVALID_DATE_RANGE",
            "message": "start_date must be before end_date"
        })))
        .mount(&server)
        .await;

    let (api, session) = api_with(&server, None);
    let err = api.query_logs(&QueryParams::new()).await.unwrap_err();

    match err {
        ApiError::Http { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "start_date must be before end_date");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!session.is_expired());
}

#[tokio::test]
async fn unauthorized_expires_session_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (api, session) = api_with(&server, Some(Credential::SessionToken("stale".to_string())));

    let first = api.query_logs(&QueryParams::new()).await.unwrap_err();
    assert!(first.is_unauthenticated());
    assert!(session.is_expired());
    assert_eq!(session.credential(), None);

    // Short-circuits without touching the server again
    let second = api.query_logs(&QueryParams::new()).await.unwrap_err();
    assert!(second.is_unauthenticated());
}

#[tokio::test]
async fn column_values_decode_both_shapes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/meta/Severity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"val": 3, "label": "Error"},
            {"val": 6, "label": "Info"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/meta/FromHost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["db1", "web1"])))
        .mount(&server)
        .await;

    let (api, _) = api_with(&server, None);

    let severities = api.column_values("Severity").await.unwrap();
    assert_eq!(
        severities.into_labeled()[0],
        MetaValue {
            val: 3,
            label: "Error".to_string()
        }
    );

    let hosts = api.column_values("FromHost").await.unwrap();
    assert!(matches!(hosts, MetaValues::Plain(_)));
    assert_eq!(hosts.into_strings(), vec!["db1", "web1"]);
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let (api, _) = api_with(&server, None);
    let err = api.query_logs(&QueryParams::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn health_reads_unhealthy_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "status": "unhealthy",
            "database": "disconnected",
            "version": "0.5.0",
            "timestamp": "2025-02-15T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let (api, _) = api_with(&server, None);
    let health = api.health().await.unwrap();
    assert_eq!(health.status, "unhealthy");
    assert_eq!(health.database.as_deref(), Some("disconnected"));
    assert!(!health.setup_mode);
}

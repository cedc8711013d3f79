//! End-to-end tests through the public app router against mocked upstreams.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use lifedash_core::MemoryPreferenceStore;
use lifedash_server::config::{NotionConfig, SupabaseConfig};
use lifedash_server::{create_app, AppState, ServerConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app(config: ServerConfig) -> (Arc<AppState>, Router) {
    let state = AppState::new(config, Arc::new(MemoryPreferenceStore::default()))
        .await
        .unwrap();
    (state.clone(), create_app(state))
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = call(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn supabase(server: &MockServer) -> Option<SupabaseConfig> {
    Some(SupabaseConfig {
        url: server.uri(),
        key: "service-key".into(),
    })
}

#[tokio::test]
async fn image_proxy_replaces_xml_error_with_png() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket/cover.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string("<?xml version=\"1.0\"?><Error><Code>NoSuchKey</Code></Error>"),
        )
        .mount(&server)
        .await;

    let (_, app) = app(ServerConfig::default()).await;
    let uri = format!(
        "/api/image-proxy?url={}",
        urlencoding::encode(&format!("{}/bucket/cover.jpg", server.uri()))
    );
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n");
    assert_eq!(body.len(), 68);
}

#[tokio::test]
async fn image_proxy_is_reachable_without_token() {
    let (_, app) = app(ServerConfig {
        api_token: Some("secret".into()),
        ..Default::default()
    })
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/image-proxy?url=http%3A%2F%2F127.0.0.1%3A1%2Fa.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
}

#[tokio::test]
async fn api_token_guards_everything_but_health() {
    let (_, app) = app(ServerConfig {
        api_token: Some("letmein".into()),
        ..Default::default()
    })
    .await;

    let (status, _) = get_json(app.clone(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_json(app.clone(), "/api/notion/habits").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let request = Request::builder()
        .uri("/api/preferences")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn board_keeps_done_months_hidden_by_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "title": "Arrival (2016)", "status": "Done", "category": "Movies",
              "monthly_tracking": ["March 2024"] },
            { "id": 2, "title": "Piranesi", "status": "Done", "category": "Books",
              "monthly_tracking": ["February 2024"] },
            { "id": 3, "title": "Andor", "status": "Not started", "category": "Series" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (_, app) = app(ServerConfig {
        supabase: supabase(&server),
        ..Default::default()
    })
    .await;
    let (status, board) = get_json(
        app.clone(),
        "/api/media/board?category=Movies&groupDoneByMonth=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let groups = board["groups"].as_array().unwrap();
    let keys: Vec<&str> = groups.iter().map(|g| g["key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["To-do", "Done"]);

    let todo = &groups[0];
    assert_eq!(todo["count"], 0);
    let todo_buckets: Vec<&str> = todo["body"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["key"].as_str().unwrap())
        .collect();
    assert_eq!(todo_buckets, vec!["Movies", "Series"]);

    let done = &groups[1]["body"]["items"];
    assert_eq!(done[0]["key"], "March 2024");
    assert_eq!(done[0]["items"][0]["item"]["title"], "Arrival (2016)");
    assert_eq!(done[1]["key"], "February 2024");
    assert_eq!(done[1]["items"], json!([]));

    // Served from the cache; the mock expects a single upstream read.
    let (status, _) = get_json(app, "/api/media/board").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn habit_toggle_round_trips_through_notion() {
    let server = MockServer::start().await;
    let page = |days: &str| {
        json!({
            "id": "habit-1",
            "properties": {
                "Name": { "title": [{ "plain_text": "Stretch" }] },
                "Completed Days": { "rich_text": [{ "plain_text": days }] }
            }
        })
    };
    Mock::given(method("GET"))
        .and(path("/pages/habit-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("2024-05-01,2024-05-02")))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/pages/habit-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("2024-05-01")))
        .expect(1)
        .mount(&server)
        .await;

    let (_, app) = app(ServerConfig {
        notion: Some(NotionConfig {
            api_url: server.uri(),
            token: "secret".into(),
            habits_db: Some("db".into()),
            media_db: None,
        }),
        ..Default::default()
    })
    .await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/notion/habits")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "habitId": "habit-1", "date": "2024-05-02" }).to_string()))
        .unwrap();
    let (status, body) = call(app, request).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["habit"]["completedDays"], json!(["2024-05-01"]));
}

use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, Envelope, MockConfig, API_KEY_HEADER, INVALID_API_KEY_MESSAGE};
use tower::ServiceExt;

const KEY: &str = "test-key";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn admin(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(API_KEY_HEADER, KEY)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- public ---

#[tokio::test]
async fn heartbeat_answers_at_root() {
    let resp = app().oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope = body_json(resp).await;
    assert!(!env.error);
}

#[tokio::test]
async fn pack_returns_summary() {
    let resp = app().oneshot(get("/v1/pack/Foo")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope = body_json(resp).await;
    let data = env.data.unwrap();
    assert_eq!(data["name"], "Foo");
    assert_eq!(data["versions"][0], "1.0.0");
}

#[tokio::test]
async fn unknown_pack_is_error_envelope() {
    let resp = app().oneshot(get("/v1/pack/Nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let env: Envelope = body_json(resp).await;
    assert!(env.error);
    assert_eq!(env.code, 404);
    assert_eq!(env.message.as_deref(), Some("Pack not found"));
}

#[tokio::test]
async fn packs_full_filters_by_visibility() {
    let resp = app().oneshot(get("/v1/packs/full/private")).await.unwrap();
    let env: Envelope = body_json(resp).await;
    let packs = env.data.unwrap();
    assert_eq!(packs.as_array().unwrap().len(), 1);
    assert_eq!(packs[0]["name"], "Bar");

    let resp = app().oneshot(get("/v1/packs/full/all")).await.unwrap();
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn download_stats_by_kind() {
    let resp = app().oneshot(get("/v1/stats/downloads/exe")).await.unwrap();
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap(), 120);

    let resp = app().oneshot(get("/v1/stats/downloads/dmg")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- auth ---

#[tokio::test]
async fn admin_without_key_is_401() {
    let resp = app().oneshot(get("/v1/admin/packs")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.code, 401);
    assert_eq!(env.message.as_deref(), Some(INVALID_API_KEY_MESSAGE));
}

#[tokio::test]
async fn admin_with_wrong_key_is_401() {
    let req = Request::builder()
        .uri("/v1/admin/pack/Foo")
        .header(API_KEY_HEADER, "wrong")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- rate limit ---

#[tokio::test]
async fn requests_past_limit_are_429() {
    use tower::Service;

    let mut app = app_with(MockConfig {
        request_limit: Some(1),
        ..MockConfig::default()
    })
    .into_service();

    let resp = ServiceExt::ready(&mut app).await.unwrap().call(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app).await.unwrap().call(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.code, 429);
}

// --- admin ---

#[tokio::test]
async fn file_is_served_as_base64() {
    let resp = app()
        .oneshot(admin("GET", "/v1/admin/pack/Foo/file/mods/example.jar", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap(), "yv66vg==");
}

#[tokio::test]
async fn put_file_rejects_non_base64() {
    let resp = app()
        .oneshot(admin(
            "PUT",
            "/v1/admin/pack/Foo/file/mods/new.jar",
            r#"{"data":"***"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_setting_is_404() {
    let resp = app()
        .oneshot(admin("GET", "/v1/admin/pack/Foo/settings/moderators", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn version_json_is_returned_as_object() {
    let resp = app()
        .oneshot(admin("GET", "/v1/admin/pack/Foo/versions/1.0.0/json", ""))
        .await
        .unwrap();
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap()["version"], "1.0.0");
}

#[tokio::test]
async fn missing_version_is_404() {
    let resp = app()
        .oneshot(admin("GET", "/v1/admin/pack/Foo/versions/9.9.9/xml", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let raw = body_bytes(resp).await;
    assert!(String::from_utf8_lossy(&raw).contains("Version not found"));
}

// --- full admin lifecycle ---

#[tokio::test]
async fn admin_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // upload a file
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(admin(
            "PUT",
            "/v1/admin/pack/Foo/file/mods/extra.jar",
            r#"{"data":"UEsDBA=="}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // it shows up in the folder listing
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(admin("GET", "/v1/admin/pack/Foo/files/mods", ""))
        .await
        .unwrap();
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap(), serde_json::json!(["example.jar", "extra.jar"]));

    // delete it, twice
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(admin("DELETE", "/v1/admin/pack/Foo/file/mods/extra.jar", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(admin("DELETE", "/v1/admin/pack/Foo/file/mods/extra.jar", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // testers: add then remove
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(admin("POST", "/v1/admin/pack/Foo/settings/testers", r#"["carol"]"#))
        .await
        .unwrap();
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap(), serde_json::json!(["bob", "carol"]));

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(admin("DELETE", "/v1/admin/pack/Foo/settings/testers", r#"["bob"]"#))
        .await
        .unwrap();
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap(), serde_json::json!(["carol"]));

    // an empty removal clears the list
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(admin("DELETE", "/v1/admin/pack/Foo/settings/testers", "[]"))
        .await
        .unwrap();
    let env: Envelope = body_json(resp).await;
    assert_eq!(env.data.unwrap(), serde_json::json!([]));
}

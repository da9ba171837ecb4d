mod common;

use common::TestApp;
use reqwest::StatusCode;

#[tokio::test]
async fn liveness_is_always_ok() {
    let app = TestApp::spawn().await;

    let response =
        app.client.get(format!("{}/livez", app.mgmt_url)).send().await.expect("livez");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_reports_the_store() {
    let app = TestApp::spawn().await;

    let response =
        app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.expect("readyz");
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn management_port_does_not_serve_the_api() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/v1/conversations", app.mgmt_url))
        .bearer_auth(app.token_for(1))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

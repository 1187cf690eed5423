mod support;

#[tokio::test]
async fn healthz_reports_ok() {
    let base_url = support::base_url();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/healthz"))
        .send()
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let base_url = support::base_url();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/nope"))
        .send()
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ws_route_rejects_plain_http() {
    // Without an Upgrade handshake the websocket route must refuse the
    // request rather than hang it.
    let base_url = support::base_url();
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/ws"))
        .send()
        .await
        .expect("request should succeed");

    assert!(res.status().is_client_error());
}

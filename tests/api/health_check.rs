use crate::helpers::TestApp;

#[tokio::test]
async fn is_present() {
    let app = TestApp::spawn().await;

    let res = app.health_check().await.expect("Failed to execute request");

    assert!(res.status().is_success());
}

#[tokio::test]
async fn lists_only_active_services() {
    let app = TestApp::spawn().await;

    let res = app.services().await.expect("Failed to execute request");
    assert!(res.status().is_success());

    let services: Vec<serde_json::Value> = res.json().await.expect("Failed to parse response");
    assert_eq!(4, services.len());
    assert!(services
        .iter()
        .all(|service| service["active"] == serde_json::json!(true)));
}

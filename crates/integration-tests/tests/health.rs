//! Liveness, readiness and request ids.

#![allow(clippy::unwrap_used)]

use andes_integration_tests::TestContext;

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_health_and_ready() {
    let ctx = TestContext::new().unwrap();

    let health = ctx.get("/health").await.unwrap();
    assert_eq!(health.status(), 200);
    assert!(health.headers().contains_key("x-request-id"));

    let ready = ctx.get("/health/ready").await.unwrap();
    assert_eq!(ready.status(), 200);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_upstream_request_id_is_echoed() {
    let ctx = TestContext::new().unwrap();
    let response = ctx
        .client
        .get(ctx.url("/health"))
        .header("x-request-id", "edge-1234")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "edge-1234");
}

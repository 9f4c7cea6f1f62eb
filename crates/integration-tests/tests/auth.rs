//! Registration, login and logout.

#![allow(clippy::unwrap_used)]

use andes_integration_tests::{TEST_PASSWORD, TestContext};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_register_me_logout_login() {
    let ctx = TestContext::new().unwrap();

    let (email, registered) = ctx.register_customer().await.unwrap();
    assert_eq!(registered.status(), 201);
    let user: Value = registered.json().await.unwrap();
    assert_eq!(user["email"], email.as_str());
    assert_eq!(user["role"], "customer");

    let me: Value = ctx.get("/api/auth/me").await.unwrap().json().await.unwrap();
    assert_eq!(me["id"], user["id"]);

    let logout = ctx.post("/api/auth/logout", &json!({})).await.unwrap();
    assert_eq!(logout.status(), 204);
    assert_eq!(ctx.get("/api/auth/me").await.unwrap().status(), 401);

    let login = ctx.login(&email, TEST_PASSWORD).await.unwrap();
    assert_eq!(login.status(), 200);
    assert_eq!(ctx.get("/api/auth/me").await.unwrap().status(), 200);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_duplicate_email_conflicts() {
    let ctx = TestContext::new().unwrap();
    let (email, _) = ctx.register_customer().await.unwrap();

    let other = TestContext::new().unwrap();
    let response = other
        .post(
            "/api/auth/register",
            &json!({ "email": email, "password": TEST_PASSWORD, "full_name": "Otra Persona" }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_wrong_password_is_rejected() {
    let ctx = TestContext::new().unwrap();
    let (email, _) = ctx.register_customer().await.unwrap();

    let fresh = TestContext::new().unwrap();
    let response = fresh.login(&email, "not-the-password").await.unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_weak_password_is_rejected() {
    let ctx = TestContext::new().unwrap();
    let response = ctx
        .post(
            "/api/auth/register",
            &json!({
                "email": andes_integration_tests::unique_email("debil"),
                "password": "corta",
                "full_name": "Clave Corta",
            }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

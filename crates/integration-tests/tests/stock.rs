//! Stock counters and the inventory ledger across checkout, cancellation
//! and reservation expiry.
//!
//! Each test creates its own products, so these need an admin account.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::Utc;
use serde_json::{Value, json};

use andes_api::services::orders::OrderService;
use andes_integration_tests::{TestContext, database};

/// Admin session, or `None` when no admin is configured.
async fn admin() -> Option<TestContext> {
    let ctx = TestContext::new().unwrap();
    ctx.login_admin().await.unwrap()?;
    Some(ctx)
}

async fn add(ctx: &TestContext, product_id: i64, quantity: i32) {
    let response = ctx
        .post(
            "/api/cart/items",
            &json!({ "product_id": product_id, "quantity": quantity }),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

async fn order_status(ctx: &TestContext, number: &str) -> Value {
    let order: Value = ctx
        .get(&format!("/api/orders/{number}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    order["status"].clone()
}

#[tokio::test]
#[ignore = "requires a running server and ANDES_TEST_ADMIN_EMAIL"]
async fn test_failed_checkout_reserves_nothing() {
    let Some(admin) = admin().await else {
        return;
    };
    let plenty = admin.create_product(2990, 5).await.unwrap();
    let scarce = admin.create_product(4990, 1).await.unwrap();
    let plenty_id = plenty["id"].as_i64().unwrap();
    let scarce_id = scarce["id"].as_i64().unwrap();

    let ctx = TestContext::new().unwrap();
    let (email, _) = ctx.register_customer().await.unwrap();
    add(&ctx, plenty_id, 2).await;
    add(&ctx, scarce_id, 1).await;

    // The last unit goes away between carting and checkout.
    let corrected = admin
        .post(
            &format!("/api/admin/products/{scarce_id}/stock"),
            &json!({ "delta": -1, "reason": "merma" }),
        )
        .await
        .unwrap();
    assert_eq!(corrected.status(), 200);

    let response = ctx.checkout(&email).await.unwrap();
    assert_eq!(response.status(), 409);

    assert_eq!(
        admin.stock(plenty_id).await.unwrap(),
        json!({ "on_hand": 5, "reserved": 0 })
    );
    assert_eq!(
        admin.movements(plenty_id).await.unwrap(),
        vec![("restock".to_string(), 5)]
    );

    let orders: Value = ctx.get("/api/orders").await.unwrap().json().await.unwrap();
    assert_eq!(orders["items"].as_array().unwrap().len(), 0);
    let cart: Value = ctx.get("/api/cart").await.unwrap().json().await.unwrap();
    assert_eq!(cart["item_count"], 3);
}

#[tokio::test]
#[ignore = "requires a running server and ANDES_TEST_ADMIN_EMAIL"]
async fn test_checkout_reserves_and_cancel_releases() {
    let Some(admin) = admin().await else {
        return;
    };
    let product = admin.create_product(3990, 10).await.unwrap();
    let id = product["id"].as_i64().unwrap();

    let ctx = TestContext::new().unwrap();
    let (email, _) = ctx.register_customer().await.unwrap();
    add(&ctx, id, 3).await;

    let response = ctx.checkout(&email).await.unwrap();
    assert_eq!(response.status(), 201);
    let order: Value = response.json().await.unwrap();
    let number = order["number"].as_str().unwrap();

    assert_eq!(
        admin.stock(id).await.unwrap(),
        json!({ "on_hand": 10, "reserved": 3 })
    );
    assert_eq!(admin.movements(id).await.unwrap()[0], ("reserve".to_string(), 3));

    let cancelled = ctx
        .post(&format!("/api/orders/{number}/cancel"), &json!({}))
        .await
        .unwrap();
    assert_eq!(cancelled.status(), 200);

    assert_eq!(
        admin.stock(id).await.unwrap(),
        json!({ "on_hand": 10, "reserved": 0 })
    );
    assert_eq!(
        admin.movements(id).await.unwrap(),
        vec![
            ("release".to_string(), -3),
            ("reserve".to_string(), 3),
            ("restock".to_string(), 10),
        ]
    );
}

#[tokio::test]
#[ignore = "requires a running server, DATABASE_URL and ANDES_TEST_ADMIN_EMAIL"]
async fn test_expired_reservation_is_released() {
    let Some(pool) = database().await.unwrap() else {
        return;
    };
    let Some(admin) = admin().await else {
        return;
    };
    let product = admin.create_product(5990, 4).await.unwrap();
    let id = product["id"].as_i64().unwrap();

    let ctx = TestContext::new().unwrap();
    let (email, _) = ctx.register_customer().await.unwrap();
    add(&ctx, id, 4).await;
    let order: Value = ctx.checkout(&email).await.unwrap().json().await.unwrap();
    let number = order["number"].as_str().unwrap();

    let service = OrderService::new(&pool);

    // Still inside its hold window.
    service.expire_reservations(Utc::now()).await.unwrap();
    assert_eq!(order_status(&ctx, number).await, "pending_payment");

    sqlx::query("UPDATE orders SET reserved_until = NOW() - INTERVAL '1 minute' WHERE number = $1")
        .bind(number)
        .execute(&pool)
        .await
        .unwrap();
    let expired = service.expire_reservations(Utc::now()).await.unwrap();
    assert!(expired >= 1);

    assert_eq!(order_status(&ctx, number).await, "cancelled");
    assert_eq!(
        admin.stock(id).await.unwrap(),
        json!({ "on_hand": 4, "reserved": 0 })
    );
    assert_eq!(admin.movements(id).await.unwrap()[0], ("release".to_string(), -4));

    // A second sweep finds nothing left for this order.
    service.expire_reservations(Utc::now()).await.unwrap();
    assert_eq!(admin.movements(id).await.unwrap().len(), 3);
}

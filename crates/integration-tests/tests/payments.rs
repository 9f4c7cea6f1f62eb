//! Payment confirmation against a stub gateway.
//!
//! The order is placed through the running server; the payment is started
//! and confirmed in-process with a [`StubGateway`] standing in for the real
//! one, the same way the webhook handler calls `PaymentService::confirm`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use serde_json::{Value, json};
use sqlx::PgPool;

use andes_api::db::PaymentRepository;
use andes_api::services::payments::{PaymentError, PaymentService};
use andes_core::{Clp, PaymentStatus, UserId};
use andes_integration_tests::gateway::{PAID, PENDING, StubGateway};
use andes_integration_tests::{TestContext, database};

const CALLBACK_BASE: &str = "http://127.0.0.1:3000";

struct PlacedOrder {
    customer: TestContext,
    email: String,
    user_id: UserId,
    number: String,
    total: i64,
    product_id: i64,
}

/// Admin session, database pool and a pending order for 2 of a fresh
/// product with 5 on hand.
async fn place_order() -> Option<(TestContext, PgPool, PlacedOrder)> {
    let pool = database().await.unwrap()?;
    let admin = TestContext::new().unwrap();
    admin.login_admin().await.unwrap()?;

    let product = admin.create_product(7990, 5).await.unwrap();
    let product_id = product["id"].as_i64().unwrap();

    let customer = TestContext::new().unwrap();
    let (email, _) = customer.register_customer().await.unwrap();
    let me: Value = customer.get("/api/auth/me").await.unwrap().json().await.unwrap();
    let user_id = UserId::new(i32::try_from(me["id"].as_i64().unwrap()).unwrap());

    customer
        .post(
            "/api/cart/items",
            &json!({ "product_id": product_id, "quantity": 2 }),
        )
        .await
        .unwrap();
    let order: Value = customer.checkout(&email).await.unwrap().json().await.unwrap();

    let placed = PlacedOrder {
        number: order["number"].as_str().unwrap().to_owned(),
        total: order["total"].as_i64().unwrap(),
        customer,
        email,
        user_id,
        product_id,
    };
    Some((admin, pool, placed))
}

async fn order_status(order: &PlacedOrder) -> Value {
    let body: Value = order
        .customer
        .get(&format!("/api/orders/{}", order.number))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["status"].clone()
}

#[tokio::test]
#[ignore = "requires a running server, DATABASE_URL and ANDES_TEST_ADMIN_EMAIL"]
async fn test_paid_notification_sells_reserved_stock() {
    let Some((admin, pool, order)) = place_order().await else {
        return;
    };
    let gateway = StubGateway::start().await.unwrap();
    let payments = PaymentService::new(&pool, &gateway.client, CALLBACK_BASE);

    let started = payments
        .start(order.user_id, &order.email, &order.number)
        .await
        .unwrap();
    assert!(started.redirect_url.ends_with(&started.token));

    // Still pending at the gateway: nothing moves.
    gateway.report(PENDING, order.total);
    let pending = payments.confirm(&started.token).await.unwrap();
    assert_eq!(pending.status, PaymentStatus::Initiated);
    assert_eq!(order_status(&order).await, "pending_payment");

    gateway.report(PAID, order.total);
    let paid = payments.confirm(&started.token).await.unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert_eq!(paid.amount, Clp::new(order.total));
    assert_eq!(order_status(&order).await, "paid");

    assert_eq!(
        admin.stock(order.product_id).await.unwrap(),
        json!({ "on_hand": 3, "reserved": 0 })
    );
    let movements = admin.movements(order.product_id).await.unwrap();
    assert_eq!(movements[0], ("sale".to_string(), -2));

    // A repeated notification changes nothing.
    let again = payments.confirm(&started.token).await.unwrap();
    assert_eq!(again.status, PaymentStatus::Paid);
    assert_eq!(again.updated_at, paid.updated_at);
    assert_eq!(
        admin.stock(order.product_id).await.unwrap(),
        json!({ "on_hand": 3, "reserved": 0 })
    );
    assert_eq!(admin.movements(order.product_id).await.unwrap(), movements);
}

#[tokio::test]
#[ignore = "requires a running server, DATABASE_URL and ANDES_TEST_ADMIN_EMAIL"]
async fn test_amount_mismatch_is_rejected() {
    let Some((admin, pool, order)) = place_order().await else {
        return;
    };
    let gateway = StubGateway::start().await.unwrap();
    let payments = PaymentService::new(&pool, &gateway.client, CALLBACK_BASE);
    let started = payments
        .start(order.user_id, &order.email, &order.number)
        .await
        .unwrap();

    gateway.report(PAID, order.total - 1000);
    let err = payments.confirm(&started.token).await.unwrap_err();
    assert!(
        matches!(&err, PaymentError::AmountMismatch { expected, reported }
            if *expected == Clp::new(order.total) && *reported == Clp::new(order.total - 1000)),
        "{err}"
    );

    let stored = PaymentRepository::new(&pool)
        .get_by_token(&started.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Rejected);

    assert_eq!(order_status(&order).await, "pending_payment");
    assert_eq!(
        admin.stock(order.product_id).await.unwrap(),
        json!({ "on_hand": 5, "reserved": 2 })
    );

    // The rejection is final; a later correct report is ignored.
    gateway.report(PAID, order.total);
    let again = payments.confirm(&started.token).await.unwrap();
    assert_eq!(again.status, PaymentStatus::Rejected);
    assert_eq!(order_status(&order).await, "pending_payment");
}

#[tokio::test]
#[ignore = "requires a running server and DATABASE_URL"]
async fn test_unknown_token_is_refused() {
    let Some(pool) = database().await.unwrap() else {
        return;
    };
    let gateway = StubGateway::start().await.unwrap();
    let err = PaymentService::new(&pool, &gateway.client, CALLBACK_BASE)
        .confirm("never-issued")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::UnknownToken));
}

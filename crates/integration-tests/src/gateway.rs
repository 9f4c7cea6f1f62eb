//! In-process stand-in for the payment gateway.
//!
//! `payment/create` hands out a fresh token; `payment/getStatus` answers
//! with whatever status and amount the test last set through
//! [`StubGateway::report`].

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use andes_api::config::PaymentGatewayConfig;
use andes_api::services::payments::GatewayClient;

/// Gateway status code for a payment still in progress.
pub const PENDING: i64 = 1;
/// Gateway status code for a completed payment.
pub const PAID: i64 = 2;

#[derive(Clone, Default)]
struct Reported {
    status: Arc<AtomicI64>,
    amount: Arc<AtomicI64>,
}

/// A gateway on a random local port plus a client pointed at it.
pub struct StubGateway {
    pub client: GatewayClient,
    reported: Reported,
}

impl StubGateway {
    /// Bind the stub and build a client for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind or the client cannot be
    /// built.
    pub async fn start() -> std::io::Result<Self> {
        let reported = Reported::default();
        reported.status.store(PENDING, Ordering::SeqCst);

        let app = Router::new()
            .route("/payment/create", post(create))
            .route("/payment/getStatus", get(status))
            .with_state(reported.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = GatewayClient::new(&PaymentGatewayConfig {
            base_url: format!("http://{addr}"),
            api_key: SecretString::from("stub-api-key".to_string()),
            secret: SecretString::from("stub-signing-secret".to_string()),
        })
        .map_err(std::io::Error::other)?;

        Ok(Self { client, reported })
    }

    /// Status code and amount the next `payment/getStatus` returns.
    pub fn report(&self, status: i64, amount: i64) {
        self.reported.status.store(status, Ordering::SeqCst);
        self.reported.amount.store(amount, Ordering::SeqCst);
    }
}

async fn create() -> Json<Value> {
    Json(json!({
        "url": "http://gateway.test/pay",
        "token": uuid::Uuid::new_v4().simple().to_string(),
        "flowOrder": 1,
    }))
}

async fn status(State(reported): State<Reported>) -> Json<Value> {
    Json(json!({
        "commerceOrder": "stub",
        "status": reported.status.load(Ordering::SeqCst),
        "amount": reported.amount.load(Ordering::SeqCst),
    }))
}

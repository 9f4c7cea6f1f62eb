//! Black-box tests for the Andes Market API.
//!
//! The tests talk HTTP to a running server and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! andes-cli migrate
//! andes-cli seed seed/demo.yaml
//! andes-cli user create -e admin@andes.test -n "Admin" -r admin -p <password>
//! cargo run -p andes-api &
//!
//! ANDES_TEST_ADMIN_EMAIL=admin@andes.test ANDES_TEST_ADMIN_PASSWORD=<password> \
//!     cargo test -p andes-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `ANDES_TEST_BASE_URL` - Server under test (default: `http://127.0.0.1:3000`)
//! - `ANDES_TEST_ADMIN_EMAIL`, `ANDES_TEST_ADMIN_PASSWORD` - Admin account for
//!   the admin and stock tests; those tests return early when unset
//! - `DATABASE_URL` - Database of the server under test, for the reservation
//!   expiry and payment tests; those tests return early when unset

pub mod gateway;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde_json::{Value, json};
use sqlx::PgPool;

/// Password used for every account the tests register.
pub const TEST_PASSWORD: &str = "cordillera-2024";

/// A client with its own cookie jar, so each context is one browser session.
///
/// Each context also sends its own `X-Forwarded-For` address, so parallel
/// tests do not share an auth rate-limit bucket.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl TestContext {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> reqwest::Result<Self> {
        let base_url = std::env::var("ANDES_TEST_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        let mut headers = HeaderMap::new();
        if let Ok(address) = HeaderValue::from_str(&client_address()) {
            headers.insert("x-forwarded-for", address);
        }
        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.client.get(self.url(path)).send().await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Result<Response> {
        self.client.post(self.url(path)).json(body).send().await
    }

    /// Register a customer with a unique email and stay logged in.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn register_customer(&self) -> reqwest::Result<(String, Response)> {
        let email = unique_email("cliente");
        let response = self
            .post(
                "/api/auth/register",
                &json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "full_name": "Cliente de Prueba",
                }),
            )
            .await?;
        Ok((email, response))
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn login(&self, email: &str, password: &str) -> reqwest::Result<Response> {
        self.post(
            "/api/auth/login",
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Log in as the configured admin. `None` when no admin is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn login_admin(&self) -> reqwest::Result<Option<Response>> {
        let (Ok(email), Ok(password)) = (
            std::env::var("ANDES_TEST_ADMIN_EMAIL"),
            std::env::var("ANDES_TEST_ADMIN_PASSWORD"),
        ) else {
            return Ok(None);
        };
        self.login(&email, &password).await.map(Some)
    }

    /// Create an active product with `stock` units on hand. Needs an admin
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or is refused.
    pub async fn create_product(&self, price: i64, stock: i32) -> reqwest::Result<Value> {
        let sku = format!("IT-{}", &uuid::Uuid::new_v4().simple().to_string()[..10]);
        let mut product: Value = self
            .post(
                "/api/admin/products",
                &json!({
                    "sku": sku,
                    "name": format!("Producto {sku}"),
                    "price": price,
                    "weight_grams": 200,
                }),
            )
            .await?
            .error_for_status()?
            .json()
            .await?;
        if stock > 0 {
            product = self
                .post(
                    &format!("/api/admin/products/{}/stock", product["id"]),
                    &json!({ "delta": stock, "reason": "stock de prueba" }),
                )
                .await?
                .error_for_status()?
                .json()
                .await?;
        }
        Ok(product)
    }

    /// `stock` of a product as the admin panel reports it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn stock(&self, product_id: i64) -> reqwest::Result<Value> {
        let product: Value = self
            .get(&format!("/api/admin/products/{product_id}"))
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(product["stock"].clone())
    }

    /// Ledger entries of a product as `(kind, quantity)`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn movements(&self, product_id: i64) -> reqwest::Result<Vec<(String, i64)>> {
        let page: Value = self
            .get(&format!("/api/admin/products/{product_id}/movements"))
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|m| {
                        (
                            m["kind"].as_str().unwrap_or_default().to_owned(),
                            m["quantity"].as_i64().unwrap_or_default(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Check out the session's cart to a Santiago address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn checkout(&self, email: &str) -> reqwest::Result<Response> {
        self.post(
            "/api/checkout",
            &json!({
                "customer": {
                    "full_name": "Cliente de Prueba",
                    "email": email,
                    "phone": "+56912345678",
                },
                "address": santiago_address(),
            }),
        )
        .await
    }
}

/// Pool on the server's database. `None` when `DATABASE_URL` is unset.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn database() -> Result<Option<PgPool>, sqlx::Error> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        return Ok(None);
    };
    PgPool::connect(&url).await.map(Some)
}

/// A random private address for `X-Forwarded-For`.
fn client_address() -> String {
    let bytes = *uuid::Uuid::new_v4().as_bytes();
    let [a, b, c, ..] = bytes;
    format!("10.{a}.{b}.{}", c.max(1))
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}+{}@andes.test", uuid::Uuid::new_v4().simple())
}

/// A Santiago delivery address.
#[must_use]
pub fn santiago_address() -> Value {
    json!({
        "recipient": "Cliente de Prueba",
        "phone": "+56912345678",
        "street": "Av. Providencia",
        "number": "1234",
        "apartment": "Depto 501",
        "commune": "Providencia",
        "city": "Santiago",
        "region_code": "RM",
    })
}

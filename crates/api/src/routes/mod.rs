//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database)
//!
//! # Catalog
//! GET  /api/products                        - Product listing (?category, q, on_sale, page, per_page)
//! GET  /api/products/{slug}                 - Product detail
//! GET  /api/categories                      - Category tree
//! GET  /api/categories/{slug}/products      - Products in a category subtree
//!
//! # Cart (user or guest session)
//! GET    /api/cart                          - Current cart
//! DELETE /api/cart                          - Empty the cart
//! POST   /api/cart/items                    - Add units of a product
//! PATCH  /api/cart/items/{product_id}       - Set quantity (0 removes)
//! DELETE /api/cart/items/{product_id}       - Remove a line
//!
//! # Shipping
//! POST /api/shipping/quote                  - Best quote for the cart
//! POST /api/shipping/options                - Cheapest quote per carrier
//! GET  /api/shipping/regions                - Served regions
//!
//! # Checkout and orders (auth required)
//! POST /api/checkout                        - Place an order
//! GET  /api/orders                          - Own orders
//! GET  /api/orders/{number}                 - Own order detail
//! POST /api/orders/{number}/cancel          - Cancel an unpaid order
//!
//! # Payments
//! POST /api/payments/orders/{number}        - Start paying an order (auth)
//! POST /api/payments/webhook                - Gateway confirmation (form `token`)
//! GET  /api/payments/return                 - Payer return page (?token)
//!
//! # Auth (rate limited)
//! POST /api/auth/register
//! POST /api/auth/login
//! POST /api/auth/logout
//! GET  /api/auth/me
//!
//! # Account (auth required)
//! GET    /api/account/addresses
//! POST   /api/account/addresses
//! PUT    /api/account/addresses/{id}
//! DELETE /api/account/addresses/{id}
//! POST   /api/account/addresses/{id}/default
//!
//! # Admin (staff / admin)
//! /api/admin/...                            - See `admin`
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(auth_rate_limiter())
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{slug}", get(products::show))
        .route("/categories", get(categories::tree))
        .route("/categories/{slug}/products", get(products::by_category))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{product_id}",
            patch(cart::set_item).delete(cart::remove_item),
        )
}

/// Create the shipping routes router.
pub fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route("/quote", post(shipping::quote))
        .route("/options", post(shipping::options))
        .route("/regions", get(shipping::regions))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{number}", get(orders::show))
        .route("/{number}/cancel", post(orders::cancel))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{number}", post(payments::start))
        .route("/webhook", post(payments::webhook))
        .route("/return", get(payments::payment_return))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            put(account::update_address).delete(account::delete_address),
        )
        .route(
            "/addresses/{id}/default",
            post(account::set_default_address),
        )
}

/// Create all `/api` routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/shipping", shipping_routes())
        .route("/checkout", post(checkout::checkout))
        .nest("/orders", order_routes())
        .nest("/payments", payment_routes())
        .nest("/account", account_routes())
        .nest("/admin", admin::routes())
        .nest("/auth", auth_routes());

    Router::new().nest("/api", api)
}

//! Cart route handlers.
//!
//! Logged-in users own one cart. Guests get a random token stored in the
//! session under `guest_cart`; it is merged into the user cart on login.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use andes_core::ProductId;
use andes_core::checkout::MAX_LINE_QUANTITY;

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::{CartOwner, CartView, CurrentUser, session_keys};
use crate::state::AppState;

/// `POST /api/cart/items` body.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// `PATCH /api/cart/items/{product_id}` body.
#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i32,
}

// =============================================================================
// Owner Helpers
// =============================================================================

/// Cart owner for reads. `None` for a guest without a cart token.
async fn current_owner(session: &Session, user: Option<&CurrentUser>) -> Option<CartOwner> {
    if let Some(user) = user {
        return Some(CartOwner::User(user.id));
    }
    session
        .get::<String>(session_keys::GUEST_CART)
        .await
        .ok()
        .flatten()
        .map(CartOwner::Guest)
}

/// Cart owner for writes, issuing a guest token when needed.
async fn owner_for_write(session: &Session, user: Option<&CurrentUser>) -> Result<CartOwner> {
    if let Some(owner) = current_owner(session, user).await {
        return Ok(owner);
    }
    let token = Uuid::new_v4().simple().to_string();
    session.insert(session_keys::GUEST_CART, &token).await?;
    Ok(CartOwner::Guest(token))
}

/// Move the session's guest cart into the user's cart after login.
///
/// # Errors
///
/// Returns an error if the carts cannot be merged.
pub async fn merge_guest_cart(state: &AppState, session: &Session, user: &CurrentUser) -> Result<()> {
    let Some(token) = session.remove::<String>(session_keys::GUEST_CART).await? else {
        return Ok(());
    };
    let merged = CartRepository::new(state.pool())
        .merge_guest(&token, user.id)
        .await?;
    if merged > 0 {
        tracing::info!(user_id = %user.id, lines = merged, "Merged guest cart");
    }
    Ok(())
}

async fn view(state: &AppState, owner: Option<&CartOwner>) -> Result<CartView> {
    let repo = CartRepository::new(state.pool());
    let Some(owner) = owner else {
        return Ok(CartView::default());
    };
    let Some(cart_id) = repo.find(owner).await? else {
        return Ok(CartView::default());
    };
    let items = repo.items(cart_id).await?;
    Ok(CartView::price(&items, Utc::now()))
}

/// Check that `quantity` of a product can sit in a cart.
async fn check_line(state: &AppState, product_id: ProductId, quantity: i32) -> Result<()> {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {MAX_LINE_QUANTITY}"
        )));
    }
    let product = ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let available = product.stock.available();
    if quantity > available {
        return Err(AppError::Conflict(format!(
            "only {available} units of {} available",
            product.sku
        )));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Current cart priced at request time.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let owner = current_owner(&session, user.as_ref()).await;
    view(&state, owner.as_ref()).await.map(Json)
}

/// Add units of a product, merging with an existing line.
///
/// The merged line is capped at `MAX_LINE_QUANTITY` units.
#[instrument(skip(state, session, user))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<AddItem>,
) -> Result<Json<CartView>> {
    if body.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be positive".to_string(),
        ));
    }
    let owner = owner_for_write(&session, user.as_ref()).await?;
    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(&owner).await?;

    repo.add_quantity(cart_id, body.product_id, body.quantity)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Product".to_string()),
            e => e.into(),
        })?;

    view(&state, Some(&owner)).await.map(Json)
}

/// Set a line's quantity; zero removes it.
#[instrument(skip(state, session, user))]
pub async fn set_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
    Json(body): Json<SetQuantity>,
) -> Result<Json<CartView>> {
    let owner = owner_for_write(&session, user.as_ref()).await?;
    let repo = CartRepository::new(state.pool());
    let cart_id = repo.get_or_create(&owner).await?;

    if body.quantity == 0 {
        repo.remove_item(cart_id, product_id).await?;
    } else {
        check_line(&state, product_id, body.quantity).await?;
        repo.upsert_item(cart_id, product_id, body.quantity).await?;
    }

    view(&state, Some(&owner)).await.map(Json)
}

#[instrument(skip(state, session, user))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let owner = current_owner(&session, user.as_ref()).await;
    if let Some(owner) = &owner {
        let repo = CartRepository::new(state.pool());
        if let Some(cart_id) = repo.find(owner).await? {
            if !repo.remove_item(cart_id, product_id).await? {
                return Err(AppError::NotFound("Cart item".to_string()));
            }
        }
    }
    view(&state, owner.as_ref()).await.map(Json)
}

#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    if let Some(owner) = current_owner(&session, user.as_ref()).await {
        let repo = CartRepository::new(state.pool());
        if let Some(cart_id) = repo.find(&owner).await? {
            repo.clear(cart_id).await?;
        }
    }
    Ok(Json(CartView::default()))
}

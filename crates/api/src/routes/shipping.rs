//! Shipping quote routes.
//!
//! Quotes use the cached shipping configuration; checkout re-evaluates
//! against the rules read inside its own transaction.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use andes_core::checkout::{CartLine, merge_lines};
use andes_core::shipping::{ShippingQuote, ShippingRequest, evaluate_shipping, quote_options};
use andes_core::{Clp, ProductId, ZoneId};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::{CartOwner, CurrentUser, session_keys};
use crate::state::AppState;

/// Most lines accepted in an explicit `items` list.
pub const MAX_QUOTE_LINES: usize = 100;

/// Quote request. Without `items` the caller's current cart is used.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub region_code: String,
    pub carrier_code: Option<String>,
    pub items: Option<Vec<CartLine>>,
}

/// A zone and the regions it covers.
#[derive(Debug, Serialize)]
pub struct Region {
    pub zone_id: ZoneId,
    pub zone_name: String,
    pub region_codes: Vec<String>,
}

/// Check and merge explicit quote lines the way checkout does.
fn quote_lines(items: &[CartLine]) -> Result<Vec<CartLine>> {
    if items.len() > MAX_QUOTE_LINES {
        return Err(AppError::BadRequest(format!(
            "a quote takes at most {MAX_QUOTE_LINES} lines"
        )));
    }
    merge_lines(items).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Subtotal and weight being shipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Parcel {
    subtotal: Clp,
    weight_grams: i64,
}

async fn parcel(
    state: &AppState,
    session: &Session,
    user: Option<&CurrentUser>,
    items: Option<&[CartLine]>,
) -> Result<Parcel> {
    let now = Utc::now();

    if let Some(items) = items {
        let lines = quote_lines(items)?;
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = ProductRepository::new(state.pool()).get_many(&ids).await?;

        let mut parcel = Parcel::default();
        for line in &lines {
            let product = products
                .iter()
                .find(|p| p.id == line.product_id && p.is_active)
                .ok_or_else(|| AppError::NotFound(format!("Product {}", line.product_id)))?;
            parcel.subtotal = parcel.subtotal + product.pricing.effective_price(now).times(line.quantity);
            parcel.weight_grams += i64::from(product.weight_grams) * i64::from(line.quantity);
        }
        return Ok(parcel);
    }

    let owner = match user {
        Some(user) => Some(CartOwner::User(user.id)),
        None => session
            .get::<String>(session_keys::GUEST_CART)
            .await?
            .map(CartOwner::Guest),
    };
    let repo = CartRepository::new(state.pool());
    let cart_id = match &owner {
        Some(owner) => repo.find(owner).await?,
        None => None,
    };
    let Some(cart_id) = cart_id else {
        return Err(AppError::BadRequest("cart is empty".to_string()));
    };

    let items = repo.items(cart_id).await?;
    if items.is_empty() {
        return Err(AppError::BadRequest("cart is empty".to_string()));
    }
    let view = crate::models::CartView::price(&items, now);
    Ok(Parcel {
        subtotal: view.subtotal,
        weight_grams: view.total_weight_grams,
    })
}

/// Best quote for the cart, optionally for one carrier.
#[instrument(skip(state, session, user))]
pub async fn quote(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<ShippingQuote>> {
    let parcel = parcel(&state, &session, user.as_ref(), body.items.as_deref()).await?;
    let ctx = state.cache().shipping_context(state.pool()).await?;

    let quote = evaluate_shipping(
        &ctx,
        &ShippingRequest {
            region_code: &body.region_code,
            weight_grams: parcel.weight_grams,
            subtotal: parcel.subtotal,
            carrier_code: body.carrier_code.as_deref(),
        },
    )?;
    Ok(Json(quote))
}

/// Cheapest quote per carrier.
#[instrument(skip(state, session, user))]
pub async fn options(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<Vec<ShippingQuote>>> {
    let parcel = parcel(&state, &session, user.as_ref(), body.items.as_deref()).await?;
    let ctx = state.cache().shipping_context(state.pool()).await?;

    let quotes = quote_options(
        &ctx,
        &ShippingRequest {
            region_code: &body.region_code,
            weight_grams: parcel.weight_grams,
            subtotal: parcel.subtotal,
            carrier_code: None,
        },
    )?;
    Ok(Json(quotes))
}

/// Active zones with their region codes.
#[instrument(skip(state))]
pub async fn regions(State(state): State<AppState>) -> Result<Json<Vec<Region>>> {
    let ctx = state.cache().shipping_context(state.pool()).await?;
    let regions = ctx
        .zones
        .iter()
        .filter(|z| z.is_active)
        .map(|z| Region {
            zone_id: z.id,
            zone_name: z.name.clone(),
            region_codes: z.region_codes.clone(),
        })
        .collect();
    Ok(Json(regions))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_quote_lines_are_merged() {
        let lines = quote_lines(&[line(7, 2), line(3, 1), line(7, 5)]).unwrap();
        assert_eq!(lines, vec![line(3, 1), line(7, 7)]);
    }

    #[test]
    fn test_quote_lines_limits() {
        assert!(quote_lines(&[line(1, 0)]).is_err());
        assert!(quote_lines(&[line(1, 60), line(1, 40)]).is_err());
        assert!(quote_lines(&[]).is_err());

        let max: Vec<CartLine> = (1..=100).map(|id| line(id, 1)).collect();
        assert_eq!(quote_lines(&max).unwrap().len(), MAX_QUOTE_LINES);
        let too_many: Vec<CartLine> = (1..=101).map(|id| line(id, 1)).collect();
        let err = quote_lines(&too_many).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: a quote takes at most 100 lines");
    }
}

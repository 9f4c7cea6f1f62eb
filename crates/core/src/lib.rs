//! Andes Market Core - Domain types and business rules.
//!
//! This crate provides the types and pure rules shared by all Andes Market components:
//! - `api` - JSON API for the storefront and the admin panel
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database access,
//! no HTTP clients. The API crate loads rows, hands them to these rules and persists
//! the outcome inside its own transactions.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, CLP amounts, emails, RUTs and statuses
//! - [`pricing`] - Product price and discount precedence
//! - [`stock`] - On-hand / reserved stock bookkeeping
//! - [`catalog`] - Category tree, slugs and SKUs
//! - [`shipping`] - Shipping rule evaluation
//! - [`checkout`] - Checkout planning and order numbering

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod checkout;
pub mod pricing;
pub mod shipping;
pub mod stock;
pub mod types;

pub use types::*;

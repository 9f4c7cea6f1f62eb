//! Business logic services.
//!
//! Services own transactions that span several repositories and translate
//! domain rules from `andes_core` into database writes.
//!
//! # Services
//!
//! - `auth` - Registration and password login
//! - `audit` - Best-effort audit trail for admin writes
//! - `cache` - Category tree and shipping configuration cache
//! - `catalog` - Category tree edits
//! - `checkout` - The checkout transaction
//! - `inventory` - Stock adjustments and order stock effects
//! - `orders` - Order lifecycle and reservation expiry
//! - `payments` - Payment gateway client and confirmation

pub mod audit;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod payments;

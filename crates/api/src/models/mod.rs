//! Domain models for the API.
//!
//! Rows are decoded inside the repositories and converted into these types;
//! request bodies that need validation live next to the model they create.

pub mod address;
pub mod audit;
pub mod cart;
pub mod catalog;
pub mod inventory;
pub mod order;
pub mod page;
pub mod payment;
pub mod session;
pub mod shipping;
pub mod user;

pub use address::{Address, AddressInput};
pub use audit::{AuditEntry, AuditFilter};
pub use cart::{CartItem, CartItemView, CartOwner, CartView};
pub use catalog::{CategoryInput, Product, ProductDraft, ProductFilter, ProductInput, ProductView};
pub use inventory::{AdjustmentKind, InventoryMovement, StockAdjustment};
pub use order::{Order, OrderDetail, OrderFilter, OrderItem, ShippingSnapshot};
pub use page::{Page, PageParams, Pagination};
pub use payment::PaymentTransaction;
pub use session::{CurrentUser, keys as session_keys};
pub use shipping::{CarrierInput, RuleInput, ZoneInput};
pub use user::User;

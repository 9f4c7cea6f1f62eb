//! Core types for Andes Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod rut;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Clp;
pub use rut::{Rut, RutError};
pub use status::*;

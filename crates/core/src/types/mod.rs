//! Core types for NeoShop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod status;
pub mod variant;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError, MoneyParseError};
pub use status::OrderStatus;
pub use variant::Variant;

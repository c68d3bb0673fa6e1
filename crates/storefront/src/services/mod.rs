//! Business logic services for storefront.
//!
//! # Services
//!
//! - `cart_sync` - Fire-and-forget mirroring of cart changes to the backend
//! - `session_data` - Typed access to the cart and checkout held in the session

pub mod cart_sync;
pub mod session_data;

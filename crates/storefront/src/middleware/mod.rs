//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with in-memory store)

pub mod customer;
pub mod request_id;
pub mod session;

pub use customer::{
    OptionalCustomer, RequireCustomer, clear_current_customer, set_current_customer,
    set_two_factor_challenge, two_factor_challenge,
};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;

//! CLI command implementations.

pub mod quote;

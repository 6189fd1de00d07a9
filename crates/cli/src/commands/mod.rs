//! CLI command implementations.
//!
//! Commands write their results to the given writer; logs go to stderr.

pub mod messages;
pub mod orders;

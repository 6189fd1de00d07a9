//! Bistro storefront state layer.
//!
//! Two stores back the restaurant storefront:
//!
//! - [`orders::OrderStore`] - the customer's pre-orders, persisted to local
//!   storage and pushed to subscribers after every change
//! - [`messages::MessageStore`] - contact messages in a shared realtime
//!   database, observed through live subscriptions
//!
//! Storage backends, configuration and telemetry setup live alongside them.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod menu;
pub mod messages;
pub mod orders;
pub mod realtime;
pub mod storage;
pub mod telemetry;

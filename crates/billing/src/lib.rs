//! Entitlement and usage-quota engine.
//!
//! Decides whether an account may generate another campaign (free trial or
//! subscription quota) and records consumption. Account and campaign state
//! live behind the `AccountStore` port; `InMemoryStore` backs development
//! and tests.

pub mod entitlement;
pub mod policy;
pub mod store;

pub use entitlement::EntitlementEngine;
pub use store::{AccountStore, InMemoryStore};

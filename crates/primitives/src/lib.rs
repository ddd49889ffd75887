#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Core types shared by the store, the composition engine and dashboards.

/// Identifier types for entities, sessions and subscriptions.
pub mod ids;
/// Character regions and splice adjustment.
pub mod region;

pub use ids::{EntityKey, SessionId, SubscriptionId};
pub use region::{CharIdx, CharLen, Region, RegionMap, shift_regions};

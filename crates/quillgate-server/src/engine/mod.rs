//! The governance engine: entitlement resolution, quota ledger,
//! provider/model resolution, and the fallback-aware generation executor.
//!
//! Composed top-down per request, strictly sequential:
//! entitlement → quota → resolve → execute. The quota gate always runs
//! before money is spent on generation. Each stage is stateless per
//! request; cross-request coordination happens only through the datastore.

pub mod entitlement;
pub mod executor;
pub mod ledger;
pub mod models;
pub mod providers;

//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs`: Rich domain types (validated, business-logic-ready)
//! - `wire.rs`: Raw serde records matching the data store's rows
//! - `convert.rs`: `TryFrom` conversions with validation
//! - `state.rs`: Update methods that enforce the slice's invariants

pub mod bid;
pub mod deal;
pub mod dispute;
pub mod listing;
pub mod trader;
pub mod transaction;

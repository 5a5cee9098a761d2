//! # Integration Scenarios
//!
//! Each store instance stands in for a separate intake process; they share
//! state only through the backing database.

mod concurrency;
mod lifecycle;

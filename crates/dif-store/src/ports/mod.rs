//! # Ports Layer
//!
//! - `inbound` - the store contract consumed by intake services
//! - `outbound` - the backing document database contract this crate consumes

pub mod inbound;
pub mod outbound;

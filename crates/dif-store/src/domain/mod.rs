//! # Domain Layer
//!
//! Pure domain logic for the Dif Store.
//!
//! ## Modules
//!
//! - `entities` - Fingerprints, records, the key registry and log entries
//! - `document` - Document identity and revisions
//! - `identity` - Identity Deriver and the deterministic content hash
//! - `index` - Index definitions and read consistency
//! - `config` - Store configuration and backend URLs
//! - `errors` - Domain error types

pub mod config;
pub mod document;
pub mod entities;
pub mod errors;
pub mod identity;
pub mod index;

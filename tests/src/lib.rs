//! # Dif Store Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (has / add / registry)
//! └── src/integration/  # Several stores sharing one backing database
//!     ├── concurrency.rs
//!     └── lifecycle.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p dif-tests
//! cargo test -p dif-tests integration::concurrency
//! cargo bench -p dif-tests
//! ```

pub mod integration;

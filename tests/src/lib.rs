//! # Chorus Test Suite
//!
//! Cross-crate flows that no single crate can test on its own.
//!
//! ```text
//! tests/
//! ├── benches/          # Token factory throughput
//! └── src/integration/  # Launcher + bus + tokens end to end
//! ```
//!
//! ```bash
//! cargo test -p chorus-tests
//! cargo bench -p chorus-tests
//! ```

pub mod integration;

//! # Keyper Test Suite
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs      # shared contracts, keys and seeded databases
//!     ├── keyper_sets.rs   # L1 keyper config → consensus batch config
//!     ├── eon_dkg.rs       # consensus DKG → published eon key
//!     └── decryption.rs    # trigger → shares → decryption key
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p keyper-tests
//! cargo test -p keyper-tests integration::decryption::
//! cargo bench -p keyper-tests
//! ```

pub mod integration;

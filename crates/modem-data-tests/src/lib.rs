//! Integration tests for the modem data engine
//!
//! These tests drive the public API of `modem-data` against the mock modem:
//!
//! - `arbitration_test.rs` - Multi-slot allow/disallow scenarios and the
//!   one-data-slot invariants
//! - `call_lifecycle_test.rs` - Setup retries, technology downgrade and
//!   unclaimed call cleanup
//! - `service_test.rs` - The tokio service with an auto-responding modem
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p modem-data-tests
//! ```

// This crate only contains tests, no library code

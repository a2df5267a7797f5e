// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the muting webhook.
//!
//! These tests exercise startup, registration and the admission server
//! WITHOUT requiring a live Kubernetes cluster. The cluster API is replaced by
//! an in-memory fake and the server is driven over real TLS on loopback.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_tls_round_trip
//! ```
//!
//! ## Test Categories
//!
//! - **Registration tests**: create-then-update against the fake cluster
//! - **Router tests**: handlers driven in-process with `tower::ServiceExt::oneshot`
//! - **TLS tests**: chain verification, live round trips, bind failure and drain

mod fake_cluster;
mod fixtures;

#![allow(clippy::option_if_let_else)]

//! Shared fixtures for the compiler test suites.
//!
//! [`Fixture`] wraps a [`TypeCatalog`](cinder_compiler_semantic::TypeCatalog)
//! together with helpers that declare the type shapes the protocol and lowering
//! tests keep reaching for: deconstructible classes, disposable resources, and
//! collections enumerated through each route.

pub mod fixtures;

pub use fixtures::{
    Collection, Deconstructible, EnumeratorShape, Fixture, Holder, Resource,
};

/// Routes `tracing` events and `log` records to the test output
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

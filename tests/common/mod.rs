//! Common test utilities, fixtures, and mocks
//! This module contains shared functionality used across the integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::sync::Once;
use std::time::Duration;
use tracing::Level;

static INIT: Once = Once::new();

/// Initialize tracing for tests
pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for: {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

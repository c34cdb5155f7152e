// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test attribute that routes `tracing` output into the test harness.
//!
//! Use `use test_with_tracing::test;` in a test module; every `#[test]` in
//! that module then starts with a subscriber installed, so events emitted by
//! the code under test show up in the captured output of a failing test.

#[cfg(test)]
extern crate self as test_with_tracing;

pub use test_with_tracing_macro::test;
use tracing::metadata::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Environment variable holding a target filter, e.g. `nvme_lm=trace`.
const FILTER_VAR: &str = "NVME_LM_LOG";

#[doc(hidden)]
/// Initializes `tracing` for tests. Only the first call has an effect.
pub fn init() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let targets = std::env::var(FILTER_VAR)
            .ok()
            .and_then(|var| var.parse::<Targets>().ok())
            .unwrap_or_else(|| Targets::new().with_default(LevelFilter::DEBUG));

        // Another harness may already own the global subscriber; the test
        // still runs, it just logs through that one.
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .log_internal_errors(true)
            .with_test_writer()
            .with_max_level(LevelFilter::TRACE)
            .finish()
            .with(targets)
            .try_init();
    });
}

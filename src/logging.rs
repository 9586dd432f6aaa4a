//! # Test Logging
//!
//! Console-only structured logging for test processes. Initialization is
//! idempotent and tolerates a subscriber installed earlier by the harness
//! under test.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per test process.
///
/// The level is taken from `TESTKIT_LOG` (an `EnvFilter` directive string),
/// defaulting to `info`.
pub fn init_test_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TESTKIT_LOG").unwrap_or_else(|_| "info".to_string());

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(EnvFilter::new(filter)),
        );

        // Use try_init to avoid a panic if a global subscriber already exists
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }
    });
}

/// Log structured data for stack operations
pub fn log_stack_operation(operation: &str, target: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        target = %target,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🧪 STACK_OPERATION"
    );
}

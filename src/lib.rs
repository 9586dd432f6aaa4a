#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, RabbitMQ in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections

//! # Crypto Scout Testkit
//!
//! Ephemeral test-environment orchestration for the crypto-scout integration
//! suite: brings up a disposable PostgreSQL + RabbitMQ stack through a
//! compose CLI, waits until both dependencies actually serve requests, and
//! tears the stack down deterministically afterwards.
//!
//! ## Module Organization
//!
//! - [`stack`] - `TestStack` lifecycle (`up()` / `down()`)
//! - [`probe`] - readiness probes and the shared bounded retry loop
//! - [`process`] - external command execution with timeout and output capture
//! - [`resources`] - stack-definition resolution and materialization
//! - [`db`] - row-level reset and count helpers for tests
//! - [`config`] - environment-overridable configuration
//! - [`error`] - structured error handling
//! - [`logging`] - console tracing initialization for test processes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crypto_scout_testkit::{StackConfig, TestStack};
//!
//! # async fn example() -> crypto_scout_testkit::Result<()> {
//! crypto_scout_testkit::init_test_logging();
//!
//! let stack = TestStack::new(StackConfig::from_env()?);
//! stack.up().await?;
//!
//! // ... run integration tests against the stack ...
//!
//! stack.down().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod probe;
pub mod process;
pub mod resources;
pub mod stack;

pub use config::StackConfig;
pub use db::{can_connect, connect_pool, delete_from_tables, insert_payload, table_count};
pub use error::{Result, TestkitError};
pub use logging::init_test_logging;
pub use probe::{
    wait_until_ready, BrokerProbe, ContainerGoneProbe, DatabaseProbe, ReadinessProbe,
};
pub use process::run_command;
pub use resources::{StackHandle, COMPOSE_FILE_NAME};
pub use stack::TestStack;

//! # Test Stack Lifecycle
//!
//! Brings the disposable PostgreSQL + RabbitMQ stack up for a test run and
//! tears it down deterministically afterwards.
//!
//! Both operations are invoked serially from test setup and teardown, never
//! concurrently with themselves. The resolved stack directory is shared
//! read-only state, cached for the process lifetime; every `up()`/`down()`
//! cycle in one run reuses it.

use tracing::info;

use crate::config::StackConfig;
use crate::error::Result;
use crate::logging::log_stack_operation;
use crate::probe::{wait_until_ready, BrokerProbe, ContainerGoneProbe, DatabaseProbe};
use crate::process::run_command;
use crate::resources::{self, COMPOSE_FILE_NAME};

/// Orchestrates the ephemeral integration-test stack
pub struct TestStack {
    config: StackConfig,
}

impl TestStack {
    pub fn new(config: StackConfig) -> Self {
        Self { config }
    }

    /// Build a stack from `TESTKIT_*` environment overrides
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(StackConfig::from_env()?))
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Start the stack and wait until both dependencies serve requests.
    ///
    /// Stages run strictly in sequence: compose up (detached), database
    /// readiness, broker readiness. Any failing stage is fatal and aborts
    /// the rest; retries happen only inside the readiness waits.
    pub async fn up(&self) -> Result<()> {
        let stack = resources::resolve(&self.config).await?;
        info!(dir = %stack.dir().display(), "🚀 Starting test stack");

        let output = run_command(
            stack.dir(),
            self.config.up_timeout,
            &[
                self.config.compose_command.as_str(),
                "-f",
                COMPOSE_FILE_NAME,
                "up",
                "-d",
            ],
        )
        .await?;
        log_compose_output(&output);

        wait_until_ready(
            &DatabaseProbe::new(&self.config),
            self.config.ready_interval,
            self.config.up_timeout,
        )
        .await?;

        wait_until_ready(
            &BrokerProbe::new(&self.config),
            self.config.ready_interval,
            self.config.up_timeout,
        )
        .await?;

        log_stack_operation("up", "stack", "ready", None);
        Ok(())
    }

    /// Stop the stack, remove its volumes, and wait until every managed
    /// container has disappeared from the listing.
    pub async fn down(&self) -> Result<()> {
        let stack = resources::resolve(&self.config).await?;
        info!(dir = %stack.dir().display(), "🧹 Stopping test stack");

        let output = run_command(
            stack.dir(),
            self.config.down_timeout,
            &[
                self.config.compose_command.as_str(),
                "-f",
                COMPOSE_FILE_NAME,
                "down",
                "-v",
            ],
        )
        .await?;
        log_compose_output(&output);

        for container in &self.config.containers {
            let probe = ContainerGoneProbe::new(&self.config, stack.dir(), container);
            wait_until_ready(&probe, self.config.ready_interval, self.config.down_timeout)
                .await?;
        }

        log_stack_operation("down", "stack", "removed", Some("volumes pruned"));
        Ok(())
    }
}

impl Default for TestStack {
    fn default() -> Self {
        Self::new(StackConfig::default())
    }
}

// Compose output is informational only; it is never parsed.
fn log_compose_output(output: &str) {
    if !output.is_empty() {
        info!(%output, "Compose output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_exposes_its_configuration() {
        let stack = TestStack::default();
        assert_eq!(stack.config().compose_command, "podman-compose");
    }
}

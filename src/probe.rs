//! # Readiness Probes
//!
//! One bounded retry loop shared by every "is this dependency ready" check.
//! A probe attempt either succeeds or reports "not ready yet"; transient
//! connection and protocol failures never escape the loop. Only exhausting
//! the deadline is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use sqlx::{Connection as _, PgConnection};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::StackConfig;
use crate::error::{Result, TestkitError};
use crate::process;

/// Sleep floor guarding against a zero or negative configured interval
const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Floor for the per-attempt database connect timeout
const MIN_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

const DB_HEALTH_QUERY: &str = "SELECT 1";

/// One bounded attempt to confirm a dependency can serve requests
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Dependency name used in timeout errors and logs
    fn name(&self) -> &str;

    /// Attempt the probe once; `false` means "not ready yet"
    async fn attempt(&self) -> bool;
}

/// Poll `probe` until it succeeds or `timeout` elapses.
///
/// The deadline is absolute, computed once at entry. The sleep between
/// attempts is floored at a minimum positive duration, so a misconfigured
/// zero interval cannot spin.
pub async fn wait_until_ready(
    probe: &dyn ReadinessProbe,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let interval = effective_interval(interval);

    while Instant::now() < deadline {
        if probe.attempt().await {
            debug!(dependency = probe.name(), "Dependency ready");
            return Ok(());
        }

        sleep(interval).await;
    }

    Err(TestkitError::NotReady {
        dependency: probe.name().to_string(),
        timeout_seconds: timeout.as_secs(),
    })
}

fn effective_interval(interval: Duration) -> Duration {
    interval.max(MIN_RETRY_INTERVAL)
}

/// Database readiness: one short-lived connection issuing a trivial query.
/// One fetched row means ready.
pub struct DatabaseProbe {
    url: String,
    connect_timeout: Duration,
}

impl DatabaseProbe {
    pub fn new(config: &StackConfig) -> Self {
        Self {
            url: config.database_url.clone(),
            // One attempt never outlives the retry cadence by much.
            connect_timeout: config.ready_interval.max(MIN_CONNECT_TIMEOUT),
        }
    }

    async fn try_query(&self) -> std::result::Result<i32, sqlx::Error> {
        let mut conn = PgConnection::connect(&self.url).await?;
        let row = sqlx::query_scalar::<_, i32>(DB_HEALTH_QUERY)
            .fetch_one(&mut conn)
            .await;
        // Closed before the next attempt regardless of the query outcome.
        let _ = conn.close().await;
        row
    }
}

#[async_trait]
impl ReadinessProbe for DatabaseProbe {
    fn name(&self) -> &str {
        "PostgreSQL"
    }

    async fn attempt(&self) -> bool {
        matches!(
            tokio::time::timeout(self.connect_timeout, self.try_query()).await,
            Ok(Ok(_))
        )
    }
}

/// Broker readiness: one short-lived AMQP connection declaring the durable
/// test queue. A successful declare handshake means ready.
pub struct BrokerProbe {
    uri: String,
    queue: String,
}

impl BrokerProbe {
    pub fn new(config: &StackConfig) -> Self {
        Self {
            uri: format!(
                "amqp://{}:{}@{}:{}/%2f",
                config.broker_user, config.broker_password, config.broker_host, config.broker_port
            ),
            queue: config.broker_queue.clone(),
        }
    }

    async fn try_declare(&self) -> std::result::Result<(), lapin::Error> {
        let connection = Connection::connect(
            &self.uri,
            ConnectionProperties::default().with_connection_name("crypto-scout-testkit".into()),
        )
        .await?;

        let declared = async {
            let channel = connection.create_channel().await?;
            channel
                .queue_declare(
                    &self.queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;
            Ok(())
        }
        .await;

        // Closed before the next attempt regardless of the declare outcome.
        let _ = connection.close(0, "").await;
        declared
    }
}

#[async_trait]
impl ReadinessProbe for BrokerProbe {
    fn name(&self) -> &str {
        "RabbitMQ"
    }

    async fn attempt(&self) -> bool {
        self.try_declare().await.is_ok()
    }
}

/// Container removal: ready once the container name no longer appears in
/// the listing, matched exactly per trimmed line.
pub struct ContainerGoneProbe {
    container: String,
    command: String,
    dir: PathBuf,
    list_timeout: Duration,
    name: String,
}

impl ContainerGoneProbe {
    pub fn new(config: &StackConfig, dir: &Path, container: &str) -> Self {
        Self {
            container: container.to_string(),
            command: config.container_command.clone(),
            dir: dir.to_path_buf(),
            list_timeout: config.list_timeout,
            name: format!("Removal of container '{container}'"),
        }
    }
}

#[async_trait]
impl ReadinessProbe for ContainerGoneProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self) -> bool {
        let tokens = [
            self.command.as_str(),
            "ps",
            "-a",
            "--format",
            "{{.Names}}",
        ];

        // A failing listing counts as "not ready yet", like any other probe.
        match process::run_command(&self.dir, self.list_timeout, &tokens).await {
            Ok(output) => !listing_contains(&output, &self.container),
            Err(_) => false,
        }
    }
}

fn listing_contains(output: &str, container: &str) -> bool {
    output.lines().any(|line| line.trim() == container)
}

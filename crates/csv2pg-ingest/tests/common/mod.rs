//! Shared test utilities for csv2pg ingest tests
//!
//! - [`FakeDb`]: an in-memory stand-in for PostgreSQL that records every
//!   operation the engine performs
//! - [`TestPostgres`]: a real PostgreSQL in a container (needs Docker)
//! - small helpers for writing fixture directories

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio_util::sync::CancellationToken;
use tracing::info;

use csv2pg_common::{ConnectionConfig, SafeIdentifier};
use csv2pg_ingest::database::{Connector, Session, TableTarget};
use csv2pg_ingest::LoadError;

/// Initialize tracing once for a test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Write `files` (name, contents) into `dir`.
pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).expect("write fixture file");
    }
}

// ============================================================================
// In-memory database
// ============================================================================

/// One call the engine made against the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Connect,
    EnsureSchema(String),
    ReplaceTable {
        table: String,
        columns: Vec<String>,
        rows: usize,
    },
    Close,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub ops: Vec<Op>,
    /// Committed tables by `schema.table`
    pub tables: BTreeMap<String, Vec<Vec<String>>>,
    pub schemas: HashSet<String>,
    pub refuse_connect: bool,
    /// Tables whose load fails with a database error
    pub failing_tables: HashSet<String>,
    /// Table whose load triggers cancellation mid-copy
    pub cancel_on: Option<String>,
    pub open_sessions: usize,
}

/// Shared handle to the fake database
#[derive(Debug, Clone, Default)]
pub struct FakeDb {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake db lock")
    }

    pub fn refuse_connections(&self) {
        self.state().refuse_connect = true;
    }

    pub fn fail_table(&self, table: &str) {
        self.state().failing_tables.insert(table.to_string());
    }

    pub fn cancel_on(&self, table: &str) {
        self.state().cancel_on = Some(table.to_string());
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }

    pub fn table(&self, qualified: &str) -> Option<Vec<Vec<String>>> {
        self.state().tables.get(qualified).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state().tables.keys().cloned().collect()
    }

    /// Tables the engine asked to replace, in order.
    pub fn replaced(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::ReplaceTable { table, .. } => Some(table),
                _ => None,
            })
            .collect()
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector { db: self.clone() }
    }
}

pub struct FakeConnector {
    db: FakeDb,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, config: &ConnectionConfig) -> csv2pg_ingest::Result<Box<dyn Session>> {
        let mut state = self.db.state();
        if state.refuse_connect {
            return Err(LoadError::Connect {
                target: config.display_target(),
                source: sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
            });
        }
        state.ops.push(Op::Connect);
        state.open_sessions += 1;
        Ok(Box::new(FakeSession {
            db: self.db.clone(),
        }))
    }
}

struct FakeSession {
    db: FakeDb,
}

#[async_trait]
impl Session for FakeSession {
    async fn ensure_schema(&mut self, schema: &SafeIdentifier) -> csv2pg_ingest::Result<()> {
        let mut state = self.db.state();
        state.ops.push(Op::EnsureSchema(schema.to_string()));
        state.schemas.insert(schema.to_string());
        Ok(())
    }

    async fn replace_table(
        &mut self,
        target: &TableTarget<'_>,
        rows: &[Vec<String>],
        cancel: &CancellationToken,
    ) -> csv2pg_ingest::Result<u64> {
        let mut state = self.db.state();
        let table = target.table.to_string();
        state.ops.push(Op::ReplaceTable {
            table: table.clone(),
            columns: target.columns.names().map(str::to_string).collect(),
            rows: rows.len(),
        });

        if state.cancel_on.as_deref() == Some(table.as_str()) {
            cancel.cancel();
            return Err(LoadError::Cancelled);
        }
        if state.failing_tables.contains(&table) {
            return Err(LoadError::Database(sqlx::Error::Protocol(format!(
                "simulated failure creating {table}"
            ))));
        }

        state.tables.insert(target.display_name(), rows.to_vec());
        Ok(rows.len() as u64)
    }

    async fn close(self: Box<Self>) -> csv2pg_ingest::Result<()> {
        let mut state = self.db.state();
        state.ops.push(Op::Close);
        state.open_sessions -= 1;
        Ok(())
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL in a container, for end-to-end tests
pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    config: ConnectionConfig,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let config = ConnectionConfig::new()
            .with_host(host.to_string())
            .with_port(port)
            .with_user("postgres")
            .with_password("postgres")
            .with_database("postgres");

        Ok(Self { container, config })
    }

    pub fn config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    /// A separate connection for inspecting what a run left behind.
    pub async fn inspect(&self) -> Result<sqlx::PgConnection> {
        csv2pg_ingest::postgres::open_connection(&self.config, None)
            .await
            .context("Failed to open inspection connection")
    }
}

//! PostgreSQL implementation of [`Connector`] and [`Session`] on `sqlx`

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Postgres, Transaction};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use csv2pg_common::{ConnectionConfig, SafeIdentifier};

use crate::config::DEFAULT_BATCH_ROWS;
use crate::database::{create_schema_sql, encode_copy_rows, Connector, Session, TableTarget};
use crate::error::{LoadError, Result};

const APPLICATION_NAME: &str = "csv2pg";

/// Build driver options from resolved settings.
///
/// An empty password is left unset so `.pgpass` and trust auth still apply.
pub fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user)
        .application_name(APPLICATION_NAME);

    if config.password.is_empty() {
        options
    } else {
        options.password(&config.password)
    }
}

/// Open one connection, optionally bounded by `timeout`.
pub async fn open_connection(
    config: &ConnectionConfig,
    timeout: Option<Duration>,
) -> Result<PgConnection> {
    let target = config.display_target();
    let options = connect_options(config);
    let connect = PgConnection::connect_with(&options);

    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| LoadError::ConnectTimeout {
                target: target.clone(),
                timeout: limit,
            })?,
        None => connect.await,
    };

    result.map_err(|source| LoadError::Connect { target, source })
}

/// Opens [`PgSession`]s
#[derive(Debug, Clone)]
pub struct PgConnector {
    connect_timeout: Option<Duration>,
    batch_rows: usize,
}

impl Default for PgConnector {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

impl PgConnector {
    pub fn new(connect_timeout: Option<Duration>, batch_rows: usize) -> Self {
        Self {
            connect_timeout,
            batch_rows: batch_rows.max(1),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>> {
        let conn = open_connection(config, self.connect_timeout).await?;
        info!(server = %config.display_target(), user = %config.user, "Connected to PostgreSQL");
        Ok(Box::new(PgSession {
            conn,
            batch_rows: self.batch_rows,
        }))
    }
}

/// A run's single connection
pub struct PgSession {
    conn: PgConnection,
    batch_rows: usize,
}

impl PgSession {
    async fn rebuild(
        tx: &mut Transaction<'_, Postgres>,
        target: &TableTarget<'_>,
        rows: &[Vec<String>],
        batch_rows: usize,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        sqlx::query(&target.drop_sql()).execute(&mut **tx).await?;
        sqlx::query(&target.create_sql()).execute(&mut **tx).await?;

        let mut copy = tx.copy_in_raw(&target.copy_sql()).await?;
        for chunk in rows.chunks(batch_rows) {
            if cancel.is_cancelled() {
                if let Err(e) = copy.abort("load cancelled").await {
                    debug!(error = %e, "COPY abort reported an error");
                }
                return Err(LoadError::Cancelled);
            }
            copy.send(encode_copy_rows(chunk)?).await?;
        }

        Ok(copy.finish().await?)
    }
}

#[async_trait]
impl Session for PgSession {
    async fn ensure_schema(&mut self, schema: &SafeIdentifier) -> Result<()> {
        sqlx::query(&create_schema_sql(schema))
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn replace_table(
        &mut self,
        target: &TableTarget<'_>,
        rows: &[Vec<String>],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let table = target.display_name();
        let mut tx = self.conn.begin().await?;

        match Self::rebuild(&mut tx, target, rows, self.batch_rows, cancel).await {
            Ok(copied) => {
                tx.commit().await?;
                debug!(table = %table, rows = copied, "Committed table");
                Ok(copied)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(table = %table, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Result of a successful [`probe`]
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub server_version: String,
    pub elapsed: Duration,
}

/// Connect, ask the server for its version and disconnect.
///
/// The whole round trip must finish within `timeout`.
pub async fn probe(config: &ConnectionConfig, timeout: Duration) -> Result<ProbeReport> {
    let started = Instant::now();
    let check = async {
        let mut conn = open_connection(config, None).await?;
        let server_version: String = sqlx::query_scalar("SHOW server_version")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;
        Ok::<_, LoadError>(server_version)
    };

    let server_version = tokio::time::timeout(timeout, check)
        .await
        .map_err(|_| LoadError::ConnectTimeout {
            target: config.display_target(),
            timeout,
        })??;

    Ok(ProbeReport {
        server_version,
        elapsed: started.elapsed(),
    })
}

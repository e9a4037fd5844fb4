use std::time::Duration;

use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use tokio_postgres::NoTls;
use tokio_postgres::config::SslMode;
use tracing::info;

use crate::{DbConfig, Result, migrations};

const MAX_POOL_SIZE: usize = 16;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled Postgres handle shared by every durable backend.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// Build a pool for `config`. Connections are opened lazily, so this
    /// succeeds even when the server is down; use [`Database::ping`] to check.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unreadable CA bundle, or pool
    /// construction errors.
    pub fn connect(config: &DbConfig) -> Result<Self> {
        config.validate()?;

        let port = u16::try_from(config.port)
            .map_err(|e| crate::DbError::config(format!("invalid port: {e}")))?;
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(port)
            .dbname(&config.dbname)
            .user(&config.user)
            .password(&config.password)
            .connect_timeout(CONNECT_TIMEOUT);

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match &config.ca_cert_path {
            Some(ca) => {
                pg.ssl_mode(SslMode::Prefer);
                let mut builder = SslConnector::builder(SslMethod::tls())?;
                builder.set_ca_file(ca)?;
                info!(
                    host = %config.host,
                    port,
                    ca = %ca.display(),
                    "connecting to postgres with TLS"
                );
                Manager::from_config(pg, MakeTlsConnector::new(builder.build()), manager_config)
            }
            None => {
                pg.ssl_mode(SslMode::Disable);
                info!(host = %config.host, port, "connecting to postgres");
                Manager::from_config(pg, NoTls, manager_config)
            }
        };

        let pool = Pool::builder(manager).max_size(MAX_POOL_SIZE).build()?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check out a pooled client.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DbError::Pool`] when no connection can be opened.
    pub async fn client(&self) -> Result<Object> {
        Ok(self.pool.get().await?)
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Propagates connection and query failures.
    pub async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Apply all pending embedded migrations.
    ///
    /// # Errors
    ///
    /// See [`migrations::migrate`].
    pub async fn migrate(&self) -> Result<usize> {
        let mut client = self.client().await?;
        migrations::migrate(&mut client).await
    }

    /// Revert migrations applied after `since`.
    ///
    /// # Errors
    ///
    /// See [`migrations::rollback`].
    pub async fn rollback(&self, since: DateTime<Utc>) -> Result<usize> {
        let mut client = self.client().await?;
        migrations::rollback(&mut client, since).await
    }
}

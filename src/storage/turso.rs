use libsql::{Builder, Connection, Database};
use std::{sync::Arc, time::Duration};

use super::StorageError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    free_interactions_used INTEGER NOT NULL DEFAULT 0,
    credit_balance INTEGER NOT NULL DEFAULT 0 CHECK (credit_balance >= 0)
);
CREATE TABLE IF NOT EXISTS payments (
    charge_id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    payload TEXT NOT NULL,
    credited INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

const LOCAL_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct TursoClient {
    inner: Arc<Database>,
    local: bool,
}

impl TursoClient {
    /// Opens the ledger database. `libsql://`, `https://` and `wss://` urls go to a
    /// remote Turso instance, anything else is treated as a local file path.
    pub async fn new(url: &str, token: Option<&str>) -> Result<Self, StorageError> {
        info!("Initializing TursoClient...");

        let local = !is_remote_url(url);

        let db = if local {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path).build().await?
        } else {
            let token = token.ok_or_else(|| StorageError::Other("Missing auth token for remote database".into()))?;
            Builder::new_remote(url.to_string(), token.to_string()).build().await?
        };

        let client = Self {
            inner: Arc::new(db),
            local,
        };
        client.migrate().await?;

        info!("TursoClient initialized (local: {})", local);
        Ok(client)
    }

    pub async fn get_connection(&self) -> Result<Connection, StorageError> {
        let conn = self.inner.connect()?;
        if self.local {
            conn.busy_timeout(LOCAL_BUSY_TIMEOUT)?;
        }
        Ok(conn)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.get_connection().await?;
        conn.execute_batch(SCHEMA).await?;
        debug!("Ledger schema ensured");
        Ok(())
    }
}

fn is_remote_url(url: &str) -> bool {
    ["libsql://", "https://", "http://", "wss://", "ws://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

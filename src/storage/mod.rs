// Local key-value preference store backed by SQLite
// Values are optionally encrypted at rest

mod cipher;

pub use cipher::StoreCipher;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS prefs_kv (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
)";

/// Namespaced key-value store
///
/// Several stores may share one SQLite file; each sees only its own namespace.
/// Clones share the same connection.
#[derive(Clone)]
pub struct KvStore {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
    cipher: Option<StoreCipher>,
}

impl KvStore {
    /// Open (or create) a store in the given SQLite file
    pub fn open(path: &Path, namespace: &str, cipher: Option<StoreCipher>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite store: {}", path.display()))?;

        Self::from_connection(conn, namespace, cipher)
    }

    /// In-memory store, used by tests and ephemeral sessions
    pub fn in_memory(namespace: &str, cipher: Option<StoreCipher>) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        Self::from_connection(conn, namespace, cipher)
    }

    fn from_connection(
        conn: Connection,
        namespace: &str,
        cipher: Option<StoreCipher>,
    ) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to create preference table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.to_string(),
            cipher,
        })
    }

    /// Another namespace on the same connection
    pub fn namespace(&self, namespace: &str) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            namespace: namespace.to_string(),
            cipher: self.cipher.clone(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Preference store lock poisoned"))
    }

    fn seal(&self, value: &str) -> Result<String> {
        match &self.cipher {
            Some(cipher) => cipher.encrypt(value),
            None => Ok(value.to_string()),
        }
    }

    fn open_value(&self, key: &str, stored: String) -> Result<String> {
        match &self.cipher {
            Some(cipher) => cipher
                .decrypt(&stored)
                .with_context(|| format!("Failed to decrypt preference '{}'", key)),
            None => Ok(stored),
        }
    }

    /// Read one value
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let stored: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT value FROM prefs_kv WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read preference '{}'", key))?
        };

        stored.map(|v| self.open_value(key, v)).transpose()
    }

    /// Read several values in a single snapshot
    pub fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = {
            let mut conn = self.lock()?;
            let tx = conn
                .transaction()
                .context("Failed to begin read transaction")?;
            let mut rows = Vec::with_capacity(keys.len());
            {
                let mut stmt = tx
                    .prepare("SELECT value FROM prefs_kv WHERE namespace = ?1 AND key = ?2")
                    .context("Failed to prepare preference query")?;
                for key in keys {
                    let value: Option<String> = stmt
                        .query_row(params![self.namespace, key], |row| row.get(0))
                        .optional()
                        .with_context(|| format!("Failed to read preference '{}'", key))?;
                    if let Some(value) = value {
                        rows.push((key.to_string(), value));
                    }
                }
            }
            tx.commit().context("Failed to finish read transaction")?;
            rows
        };

        rows.into_iter()
            .map(|(k, v)| -> Result<(String, String)> {
                let value = self.open_value(&k, v)?;
                Ok((k, value))
            })
            .collect()
    }

    /// Write all entries in one transaction; readers see all or none of them
    pub fn put_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut sealed = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            sealed.push((*key, self.seal(value)?));
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .context("Failed to begin write transaction")?;
        for (key, value) in &sealed {
            tx.execute(
                "INSERT INTO prefs_kv (namespace, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value",
                params![self.namespace, key, value],
            )
            .with_context(|| format!("Failed to write preference '{}'", key))?;
        }
        tx.commit().context("Failed to commit preferences")?;

        Ok(())
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_all(&[(key, value)])
    }

    /// Delete every key in this namespace
    pub fn remove_all(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM prefs_kv WHERE namespace = ?1",
            params![self.namespace],
        )
        .context("Failed to clear preferences")?;
        Ok(())
    }

    /// Raw stored text, bypassing decryption
    #[cfg(test)]
    fn raw(&self, key: &str) -> Option<String> {
        let conn = self.lock().ok()?;
        conn.query_row(
            "SELECT value FROM prefs_kv WHERE namespace = ?1 AND key = ?2",
            params![self.namespace, key],
            |row| row.get(0),
        )
        .ok()
    }
}

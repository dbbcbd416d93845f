//! Store registry: open, enumerate and delete named stores.

use super::connection::CacheDb;
use super::now_timestamp;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Handle to one named store.
///
/// Holding a handle does not pin the store; if the store is deleted, the
/// next `put` recreates it.
#[derive(Clone, Debug)]
pub struct Store {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl Store {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Summary of a store for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoreInfo {
    pub name: String,
    pub entries: u64,
    pub bytes: u64,
    pub created_at: String,
}

impl CacheDb {
    /// Handle to a store without touching the database.
    ///
    /// Reads on a missing store miss; the first write creates it.
    pub fn store(&self, name: &str) -> Store {
        Store { db: self.clone(), name: name.to_string() }
    }

    /// Open a store, creating it if it does not exist yet.
    pub async fn open_store(&self, name: &str) -> Result<Store, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("store name cannot be empty".into()));
        }

        let owned = name.to_string();
        let created_at = now_timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Store { db: self.clone(), name: name.to_string() })
    }

    /// Whether a store with this name exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every existing store, sorted.
    pub async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if the store did not exist.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry count and body size per store.
    pub async fn store_info(&self) -> Result<Vec<StoreInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<StoreInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT s.name, s.created_at, COUNT(e.key_hash), COALESCE(SUM(LENGTH(e.body)), 0)
                     FROM cache_stores s
                     LEFT JOIN cache_entries e ON e.store = s.name
                     GROUP BY s.name, s.created_at
                     ORDER BY s.name",
                )?;
                let infos = stmt
                    .query_map([], |row| {
                        Ok(StoreInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                            bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(infos)
            })
            .await
            .map_err(Error::from)
    }
}

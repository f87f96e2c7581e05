//! Generation bookkeeping.
//!
//! A generation is a named, versioned set of entries. Deleting a generation
//! cascades to its entries.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cache generation as recorded in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub name: String,
    pub created_at: String,
    pub activated_at: Option<String>,
}

/// Fixed-width timestamps so lexical order in SQLite matches time order.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("generation name cannot be empty".into()));
    }
    Ok(())
}

impl CacheDb {
    /// Create the generation if it doesn't exist. Opening an existing
    /// generation is a no-op.
    pub async fn open_generation(&self, name: &str) -> Result<(), Error> {
        validate_name(name)?;
        let name = name.to_string();
        let created_at = now_timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO generations (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List all generations, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<Generation>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<Generation>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT name, created_at, activated_at FROM generations ORDER BY created_at ASC, name ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(Generation { name: row.get(0)?, created_at: row.get(1)?, activated_at: row.get(2)? })
                })?;
                let mut generations = Vec::new();
                for row in rows {
                    generations.push(row?);
                }
                Ok(generations)
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a generation exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all its entries.
    ///
    /// Returns true if the generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record that a generation became current.
    pub async fn mark_activated(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let activated_at = now_timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let updated = conn.execute(
                    "UPDATE generations SET activated_at = ?2 WHERE name = ?1",
                    params![name, activated_at],
                )?;
                if updated == 0 {
                    return Err(Error::UnknownGeneration(name));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Name of the most recently activated generation still in the store.
    pub async fn latest_activated(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT name FROM generations WHERE activated_at IS NOT NULL
                     ORDER BY activated_at DESC, name DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                );
                match result {
                    Ok(name) => Ok(Some(name)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

//! Entry CRUD within a generation.
//!
//! Entries are keyed by (generation, request identity). Writes replace any
//! previous entry for the same key; nothing is ever updated field by field.

use super::connection::CacheDb;
use super::generations::now_timestamp;
use crate::Error;
use crate::http::{CachedResponse, Request};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Listing row for an entry, without the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub kind: String,
    pub body_len: u64,
    pub stored_at: String,
}

fn generation_exists(conn: &rusqlite::Connection, generation: &str) -> Result<bool, Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
        params![generation],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn upsert_entry(
    conn: &rusqlite::Connection, generation: &str, request: &Request, response: &CachedResponse, stored_at: &str,
) -> Result<(), Error> {
    let headers_json =
        serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;
    conn.execute(
        "INSERT INTO entries (
            generation, key, method, url, status, status_text, kind, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(generation, key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            kind = excluded.kind,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            request.key(),
            &request.method,
            &request.url,
            response.status,
            &response.status_text,
            response.kind.as_str(),
            headers_json,
            &response.body,
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Get the stored response for a request within a generation.
    ///
    /// Returns None if either the generation or the entry is absent.
    pub async fn get_entry(&self, generation: &str, request: &Request) -> Result<Option<CachedResponse>, Error> {
        let generation = generation.to_string();
        let key = request.key();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, status_text, kind, headers_json, body, stored_at
                     FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Vec<u8>>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                });

                let (url, status, status_text, kind, headers_json, body, stored_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers = serde_json::from_str(&headers_json)
                    .map_err(|e| Error::CorruptEntry(format!("headers for {url}: {e}")))?;

                Ok(Some(CachedResponse {
                    url,
                    status,
                    status_text,
                    headers,
                    body,
                    kind: kind.parse()?,
                    stored_at: Some(stored_at),
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Write a response for a request into an existing generation.
    ///
    /// Fails with `UnknownGeneration` rather than recreating a generation
    /// that was purged while the write was in flight.
    pub async fn put_entry(&self, generation: &str, request: &Request, response: &CachedResponse) -> Result<(), Error> {
        let generation = generation.to_string();
        let request = request.clone();
        let response = response.clone();
        let stored_at = now_timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                if !generation_exists(&tx, &generation)? {
                    return Err(Error::UnknownGeneration(generation));
                }
                upsert_entry(&tx, &generation, &request, &response, &stored_at)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Create a generation and populate it in a single transaction.
    ///
    /// Either the generation exists with every entry afterwards, or nothing
    /// was written.
    pub async fn put_all(&self, generation: &str, entries: Vec<(Request, CachedResponse)>) -> Result<(), Error> {
        if generation.trim().is_empty() {
            return Err(Error::InvalidInput("generation name cannot be empty".into()));
        }
        let generation = generation.to_string();
        let stored_at = now_timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO generations (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![generation, stored_at],
                )?;
                for (request, response) in &entries {
                    upsert_entry(&tx, &generation, request, response, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List the entries of a generation, ordered by URL.
    pub async fn list_entries(&self, generation: &str) -> Result<Vec<EntrySummary>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status, kind, length(body), stored_at
                     FROM entries WHERE generation = ?1 ORDER BY url ASC, method ASC",
                )?;
                let rows = stmt.query_map(params![generation], |row| {
                    Ok(EntrySummary {
                        key: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        status: row.get(3)?,
                        kind: row.get(4)?,
                        body_len: row.get::<_, i64>(5)? as u64,
                        stored_at: row.get(6)?,
                    })
                })?;
                let mut entries = Vec::new();
                for row in rows {
                    entries.push(row?);
                }
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ResponseKind;

    fn make_response(url: &str, body: &str) -> CachedResponse {
        let mut response = CachedResponse::new(url, 200, ResponseKind::Basic, body);
        response.status_text = "OK".into();
        response.headers.push(("content-type".into(), "text/html".into()));
        response
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("v1").await.unwrap();

        let request = Request::get("http://localhost:8080/index.html");
        let response = make_response(&request.url, "<html></html>");
        db.put_entry("v1", &request, &response).await.unwrap();

        let stored = db.get_entry("v1", &request).await.unwrap().unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.status_text, "OK");
        assert_eq!(stored.body, b"<html></html>");
        assert_eq!(stored.header("Content-Type"), Some("text/html"));
        assert_eq!(stored.kind, ResponseKind::Basic);
        assert!(stored.stored_at.is_some());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("v1").await.unwrap();
        let request = Request::get("http://localhost:8080/missing");
        assert!(db.get_entry("v1", &request).await.unwrap().is_none());
        assert!(db.get_entry("nope", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("v1").await.unwrap();
        let request = Request::get("http://localhost:8080/track.mp3");

        db.put_entry("v1", &request, &make_response(&request.url, "first"))
            .await
            .unwrap();
        db.put_entry("v1", &request, &make_response(&request.url, "second"))
            .await
            .unwrap();

        let stored = db.get_entry("v1", &request).await.unwrap().unwrap();
        assert_eq!(stored.body, b"second");
        assert_eq!(db.list_entries("v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_into_unknown_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get("http://localhost:8080/index.html");
        let result = db.put_entry("gone", &request, &make_response(&request.url, "x")).await;
        assert!(matches!(result, Err(Error::UnknownGeneration(_))));
        assert!(!db.has_generation("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation("v1").await.unwrap();
        db.open_generation("v2").await.unwrap();
        let request = Request::get("http://localhost:8080/index.html");
        db.put_entry("v1", &request, &make_response(&request.url, "old"))
            .await
            .unwrap();

        assert!(db.get_entry("v2", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_all_and_cascade_delete() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries: Vec<_> = ["/index.html", "/manifest.json", "/icon.png"]
            .iter()
            .map(|path| {
                let request = Request::get(format!("http://localhost:8080{path}"));
                let response = make_response(&request.url, path);
                (request, response)
            })
            .collect();

        db.put_all("v1", entries).await.unwrap();
        let listed = db.list_entries("v1").await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].url, "http://localhost:8080/icon.png");

        db.delete_generation("v1").await.unwrap();
        assert!(db.list_entries("v1").await.unwrap().is_empty());
    }
}

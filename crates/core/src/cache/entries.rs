//! Entry CRUD within a single generation.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::generations::now_timestamp;
use super::identity::RequestIdentity;
use super::response::{AssetResponse, ResponseKind};
use crate::Error;

/// A response read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Generation holding the entry.
    pub generation: String,
    pub response: AssetResponse,
    pub stored_at: String,
}

/// Listing row for inspection tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntrySummary {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub kind: ResponseKind,
    pub size: u64,
    pub stored_at: String,
}

/// Row as stored, before header and kind decoding.
pub(crate) struct RawEntry {
    generation: String,
    url: String,
    status: u16,
    status_text: Option<String>,
    headers_json: String,
    body: Vec<u8>,
    kind: String,
    stored_at: String,
}

/// Row mapper for `SELECT generation, url, status, status_text, headers_json, body, kind, stored_at`.
pub(crate) fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        generation: row.get(0)?,
        url: row.get(1)?,
        status: row.get(2)?,
        status_text: row.get(3)?,
        headers_json: row.get(4)?,
        body: row.get(5)?,
        kind: row.get(6)?,
        stored_at: row.get(7)?,
    })
}

impl RawEntry {
    pub(crate) fn decode(self) -> Result<StoredEntry, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)
            .map_err(|e| Error::CorruptEntry(format!("{}: headers: {e}", self.url)))?;
        let kind = self
            .kind
            .parse::<ResponseKind>()
            .map_err(|e| Error::CorruptEntry(format!("{}: {e}", self.url)))?;

        Ok(StoredEntry {
            generation: self.generation,
            response: AssetResponse {
                url: self.url,
                status: self.status,
                status_text: self.status_text,
                headers,
                body: Bytes::from(self.body),
                kind,
            },
            stored_at: self.stored_at,
        })
    }
}

/// Handle to one named generation of the store.
#[derive(Clone, Debug)]
pub struct Generation {
    db: CacheDb,
    name: String,
}

fn insert_entry(
    tx: &rusqlite::Transaction<'_>, generation: &str, identity: &RequestIdentity, response: &AssetResponse,
    stored_at: &str,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)
        .map_err(|e| Error::InvalidInput(format!("unserializable headers: {e}")))?;

    tx.execute(
        "INSERT INTO entries (
            generation, key_hash, method, url, status, status_text,
            headers_json, body, kind, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(generation, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            kind = excluded.kind,
            stored_at = excluded.stored_at",
        params![
            generation,
            identity.cache_key(),
            identity.method(),
            identity.url().as_str(),
            response.status,
            &response.status_text,
            headers_json,
            &response.body[..],
            response.kind.as_str(),
            stored_at,
        ],
    )?;
    Ok(())
}

impl Generation {
    pub(crate) fn new(db: CacheDb, name: String) -> Self {
        Self { db, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the response stored for `identity`.
    pub async fn get(&self, identity: &RequestIdentity) -> Result<Option<StoredEntry>, Error> {
        let name = self.name.clone();
        let key_hash = identity.cache_key();
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT generation, url, status, status_text, headers_json, body, kind, stored_at
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                match stmt.query_row(params![name, key_hash], read_entry) {
                    Ok(raw) => raw.decode().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store a copy of `response` under `identity`, replacing any previous entry.
    ///
    /// Creates the generation if this is its first write.
    pub async fn put(&self, identity: &RequestIdentity, response: &AssetResponse) -> Result<(), Error> {
        self.put_all(vec![(identity.clone(), response.clone())]).await
    }

    /// Store a batch of responses in a single transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn put_all(&self, entries: Vec<(RequestIdentity, AssetResponse)>) -> Result<(), Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let stored_at = now_timestamp();
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, stored_at],
                )?;
                for (identity, response) in &entries {
                    insert_entry(&tx, &name, identity, response, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a copy of `response` only if this generation still exists.
    ///
    /// Returns `false` without writing when the generation has been deleted,
    /// so a late write cannot bring a purged generation back.
    pub async fn put_if_present(&self, identity: &RequestIdentity, response: &AssetResponse) -> Result<bool, Error> {
        let name = self.name.clone();
        let identity = identity.clone();
        let response = response.clone();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                let present: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                if !present {
                    return Ok(false);
                }
                insert_entry(&tx, &name, &identity, &response, &now_timestamp())?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this generation.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entries in this generation ordered by URL.
    pub async fn list_entries(&self) -> Result<Vec<EntrySummary>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<EntrySummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, kind, LENGTH(body), stored_at
                     FROM entries WHERE generation = ?1 ORDER BY url ASC, method ASC",
                )?;
                let rows = stmt
                    .query_map(params![name], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u16>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(method, url, status, kind, size, stored_at)| {
                        let kind = kind
                            .parse::<ResponseKind>()
                            .map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;
                        Ok(EntrySummary { method, url, status, kind, size: size as u64, stored_at })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }
}

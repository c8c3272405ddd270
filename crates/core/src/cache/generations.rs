//! Generation-level store operations.
//!
//! A generation is one named, versioned namespace of entries. Deleting a
//! generation removes its entries through the foreign-key cascade.

use std::collections::BTreeSet;

use super::connection::CacheDb;
use super::entries::{Generation, StoredEntry, read_entry};
use super::identity::RequestIdentity;
use crate::Error;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// Summary of one generation for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
}

/// Timestamp format used for every stored time: fixed width, so string
/// ordering matches chronological ordering.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CacheDb {
    /// Get a handle to the named generation.
    ///
    /// The generation is created lazily by its first write.
    pub fn open_generation(&self, name: &str) -> Generation {
        Generation::new(self.clone(), name.to_string())
    }

    /// Names of every generation in the store.
    pub async fn list_generations(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Every generation with its entry count, oldest first.
    pub async fn generation_infos(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.created_at, COUNT(e.key_hash)
                     FROM generations g
                     LEFT JOIN entries e ON e.generation = g.name
                     GROUP BY g.name
                     ORDER BY g.created_at ASC, g.rowid ASC",
                )?;
                let infos = stmt
                    .query_map([], |row| {
                        Ok(GenerationInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(infos)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no generation had that name.
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

    /// Delete every generation.
    ///
    /// Returns the number of generations removed.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let deleted = conn.execute("DELETE FROM generations", [])?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Find an entry for `identity` in any generation.
    ///
    /// Entries in `preferred` win; otherwise the most recently stored copy.
    pub async fn match_any(&self, identity: &RequestIdentity, preferred: &str) -> Result<Option<StoredEntry>, Error> {
        let key_hash = identity.cache_key();
        let preferred = preferred.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT generation, url, status, status_text, headers_json, body, kind, stored_at
                     FROM entries WHERE key_hash = ?1
                     ORDER BY (generation = ?2) DESC, stored_at DESC
                     LIMIT 1",
                )?;

                match stmt.query_row(params![key_hash, preferred], read_entry) {
                    Ok(raw) => raw.decode().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{AssetResponse, ResponseKind};
    use bytes::Bytes;
    use url::Url;

    fn identity(url: &str) -> RequestIdentity {
        RequestIdentity::get(Url::parse(url).unwrap())
    }

    fn response(body: &'static str) -> AssetResponse {
        AssetResponse {
            url: "https://trail.example/".into(),
            status: 200,
            status_text: Some("OK".into()),
            headers: Vec::new(),
            body: Bytes::from_static(body.as_bytes()),
            kind: ResponseKind::Basic,
        }
    }

    #[tokio::test]
    async fn test_open_generation_is_lazy() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let _ = db.open_generation("site-v1");
        assert!(db.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_generation_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open_generation("site-v1");
        v1.put(&identity("https://trail.example/"), &response("one")).await.unwrap();

        assert!(db.delete_generation("site-v1").await.unwrap());
        assert!(!db.delete_generation("site-v1").await.unwrap());
        assert!(db.list_generations().await.unwrap().is_empty());
        assert!(v1.get(&identity("https://trail.example/")).await.unwrap().is_none());
        assert!(
            db.match_any(&identity("https://trail.example/"), "site-v1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = identity("https://trail.example/a.css");
        db.open_generation("site-v1").put(&id, &response("a")).await.unwrap();
        db.open_generation("site-v2").put(&id, &response("b")).await.unwrap();

        assert_eq!(db.clear().await.unwrap(), 2);
        assert!(db.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_match_any_prefers_named_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let id = identity("https://fonts.example/font.woff2");
        db.open_generation("site-v1").put(&id, &response("old")).await.unwrap();
        db.open_generation("site-v2").put(&id, &response("new")).await.unwrap();

        let hit = db.match_any(&id, "site-v1").await.unwrap().unwrap();
        assert_eq!(hit.generation, "site-v1");
        assert_eq!(hit.response.body, Bytes::from_static(b"old"));

        let hit = db.match_any(&id, "site-v3").await.unwrap().unwrap();
        assert_eq!(hit.generation, "site-v2");
    }

    #[tokio::test]
    async fn test_generation_infos_counts_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open_generation("site-v1");
        v1.put(&identity("https://trail.example/"), &response("x")).await.unwrap();
        v1.put(&identity("https://trail.example/a.css"), &response("y")).await.unwrap();
        db.open_generation("site-v2")
            .put(&identity("https://trail.example/"), &response("z"))
            .await
            .unwrap();

        let infos = db.generation_infos().await.unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name, "site-v1");
        assert_eq!(infos[0].entries, 2);
        assert_eq!(infos[1].name, "site-v2");
        assert_eq!(infos[1].entries, 1);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let id = identity("https://trail.example/styles.css");

        {
            let db = CacheDb::open(&path).await.unwrap();
            db.open_generation("site-v1").put(&id, &response("body{}")).await.unwrap();
        }

        let db = CacheDb::open(&path).await.unwrap();
        assert!(db.list_generations().await.unwrap().contains("site-v1"));
        let hit = db.open_generation("site-v1").get(&id).await.unwrap().unwrap();
        assert_eq!(hit.response.body, Bytes::from_static(b"body{}"));
    }
}

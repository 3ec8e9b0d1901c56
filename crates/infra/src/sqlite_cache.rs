//! SQLite-backed cache storage.
//!
//! Cache contents survive restarts, so a cold start can still serve the
//! shell and the last good API responses while offline.

use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use tether_cache::{CacheError, CacheResult, CacheStorage};
use tether_core::FetchResponse;

#[derive(Debug, Clone)]
pub struct SqliteCacheStorage {
    pool: SqlitePool,
}

fn storage_err(context: &str) -> impl FnOnce(sqlx::Error) -> CacheError + '_ {
    move |e| CacheError::storage(format!("{context}: {e}"))
}

impl SqliteCacheStorage {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache directory at {:?}", parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open SQLite cache at {:?}", path))?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database (one connection, so every query sees it).
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory SQLite cache")?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> anyhow::Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_names (
                name        TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create cache_names table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_name  TEXT NOT NULL,
                key         TEXT NOT NULL,
                status      INTEGER NOT NULL,
                headers     TEXT NOT NULL,
                body        BLOB NOT NULL,
                stored_at   TEXT NOT NULL,
                PRIMARY KEY (cache_name, key)
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create cache_entries table")?;

        Ok(Self { pool })
    }
}

/// Header values are stored as raw bytes; they need not be UTF-8.
fn encode_headers(headers: &HeaderMap) -> String {
    let pairs: Vec<(&str, &[u8])> = headers
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_bytes()))
        .collect();
    serde_json::to_string(&pairs).unwrap_or_else(|_| "[]".to_string())
}

fn decode_headers(raw: &str) -> Result<HeaderMap, String> {
    let pairs: Vec<(String, Vec<u8>)> = match serde_json::from_str(raw) {
        Ok(pairs) => pairs,
        // rows written before values were stored as bytes
        Err(_) => serde_json::from_str::<Vec<(String, String)>>(raw)
            .map_err(|e| e.to_string())?
            .into_iter()
            .map(|(name, value)| (name, value.into_bytes()))
            .collect(),
    };
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| e.to_string())?;
        let value = HeaderValue::from_bytes(&value).map_err(|e| e.to_string())?;
        headers.append(name, value);
    }
    Ok(headers)
}

async fn insert_entry<'e, E>(
    executor: E,
    cache: &str,
    key: &str,
    response: &FetchResponse,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO cache_entries (cache_name, key, status, headers, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (cache_name, key) DO UPDATE SET
            status = excluded.status,
            headers = excluded.headers,
            body = excluded.body,
            stored_at = excluded.stored_at
        "#,
    )
    .bind(cache)
    .bind(key)
    .bind(response.status.as_u16() as i64)
    .bind(encode_headers(&response.headers))
    .bind(response.body.to_vec())
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_name<'e, E>(executor: E, cache: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO cache_names (name, created_at) VALUES (?1, ?2)")
        .bind(cache)
        .bind(Utc::now().to_rfc3339())
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait::async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn open(&self, cache: &str) -> CacheResult<()> {
        insert_name(&self.pool, cache)
            .await
            .map_err(storage_err("failed to open cache"))
    }

    async fn has(&self, cache: &str) -> CacheResult<bool> {
        let row = sqlx::query("SELECT 1 FROM cache_names WHERE name = ?1")
            .bind(cache)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err("failed to look up cache"))?;
        Ok(row.is_some())
    }

    async fn delete(&self, cache: &str) -> CacheResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_err("failed to begin transaction"))?;
        sqlx::query("DELETE FROM cache_entries WHERE cache_name = ?1")
            .bind(cache)
            .execute(&mut *tx)
            .await
            .map_err(storage_err("failed to delete cache entries"))?;
        let removed = sqlx::query("DELETE FROM cache_names WHERE name = ?1")
            .bind(cache)
            .execute(&mut *tx)
            .await
            .map_err(storage_err("failed to delete cache"))?
            .rows_affected();
        tx.commit()
            .await
            .map_err(storage_err("failed to commit cache delete"))?;
        Ok(removed > 0)
    }

    async fn cache_names(&self) -> CacheResult<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM cache_names ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err("failed to list caches"))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()
            .map_err(storage_err("failed to decode cache name"))
    }

    async fn put(&self, cache: &str, key: &str, response: &FetchResponse) -> CacheResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_err("failed to begin transaction"))?;
        insert_name(&mut *tx, cache)
            .await
            .map_err(storage_err("failed to open cache"))?;
        insert_entry(&mut *tx, cache, key, response)
            .await
            .map_err(storage_err("failed to write cache entry"))?;
        tx.commit()
            .await
            .map_err(storage_err("failed to commit cache entry"))
    }

    async fn put_all(&self, cache: &str, entries: &[(String, FetchResponse)]) -> CacheResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_err("failed to begin transaction"))?;
        insert_name(&mut *tx, cache)
            .await
            .map_err(storage_err("failed to open cache"))?;
        for (key, response) in entries {
            insert_entry(&mut *tx, cache, key, response)
                .await
                .map_err(storage_err("failed to write cache entry"))?;
        }
        tx.commit()
            .await
            .map_err(storage_err("failed to commit cache entries"))
    }

    async fn get(&self, cache: &str, key: &str) -> CacheResult<Option<FetchResponse>> {
        let row = sqlx::query(
            r#"
            SELECT status, headers, body
            FROM cache_entries
            WHERE cache_name = ?1 AND key = ?2
            "#,
        )
        .bind(cache)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err("failed to read cache entry"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let corrupt = |reason: String| CacheError::Corrupt {
            cache: cache.to_string(),
            key: key.to_string(),
            reason,
        };

        let status: i64 = row.try_get("status").map_err(|e| corrupt(e.to_string()))?;
        let headers: String = row.try_get("headers").map_err(|e| corrupt(e.to_string()))?;
        let body: Vec<u8> = row.try_get("body").map_err(|e| corrupt(e.to_string()))?;

        let status = u16::try_from(status)
            .ok()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .ok_or_else(|| corrupt(format!("invalid status {status}")))?;

        Ok(Some(FetchResponse {
            status,
            headers: decode_headers(&headers).map_err(corrupt)?,
            body: Bytes::from(body),
        }))
    }

    async fn remove(&self, cache: &str, key: &str) -> CacheResult<bool> {
        let removed = sqlx::query("DELETE FROM cache_entries WHERE cache_name = ?1 AND key = ?2")
            .bind(cache)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err("failed to remove cache entry"))?
            .rows_affected();
        Ok(removed > 0)
    }

    async fn count(&self, cache: &str) -> CacheResult<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM cache_entries WHERE cache_name = ?1")
            .bind(cache)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err("failed to count cache entries"))?;
        let n: i64 = row
            .try_get("n")
            .map_err(storage_err("failed to decode count"))?;
        Ok(n.max(0) as usize)
    }

    async fn keys(&self, cache: &str) -> CacheResult<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM cache_entries WHERE cache_name = ?1 ORDER BY key")
            .bind(cache)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err("failed to list cache keys"))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("key"))
            .collect::<Result<_, _>>()
            .map_err(storage_err("failed to decode cache key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use std::sync::Arc;
    use tether_cache::{CacheGeneration, CacheKind, CacheStore};

    #[tokio::test]
    async fn round_trips_status_headers_and_body() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        let response = FetchResponse::new(StatusCode::CREATED)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(r#"{"id":1}"#);

        storage.put("c", "https://app.test/api/x", &response).await.unwrap();
        let back = storage.get("c", "https://app.test/api/x").await.unwrap().unwrap();

        assert_eq!(back, response);
        assert!(storage.has("c").await.unwrap());
        assert_eq!(storage.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn keeps_non_utf8_and_repeated_header_values() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        let mut response = FetchResponse::ok()
            .with_header(
                HeaderName::from_static("x-title"),
                HeaderValue::from_bytes(b"caf\xe9").unwrap(),
            )
            .with_body("menu");
        response
            .headers
            .append(http::header::SET_COOKIE, HeaderValue::from_static("a=1"));
        response
            .headers
            .append(http::header::SET_COOKIE, HeaderValue::from_static("b=2"));

        storage.put("c", "k", &response).await.unwrap();
        let back = storage.get("c", "k").await.unwrap().unwrap();

        assert_eq!(back.headers["x-title"].as_bytes(), b"caf\xe9");
        assert_eq!(back.headers.get_all(http::header::SET_COOKIE).iter().count(), 2);
        assert_eq!(back, response);
    }

    #[test]
    fn decodes_string_valued_header_rows() {
        let headers = decode_headers(r#"[["content-type","text/html"]]"#).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn last_write_wins_and_delete_is_wholesale() {
        let storage = SqliteCacheStorage::in_memory().await.unwrap();
        storage.put("c", "k", &FetchResponse::ok().with_body("one")).await.unwrap();
        storage.put("c", "k", &FetchResponse::ok().with_body("two")).await.unwrap();
        storage
            .put_all(
                "c",
                &[
                    ("a".to_string(), FetchResponse::ok()),
                    ("b".to_string(), FetchResponse::ok()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(storage.get("c", "k").await.unwrap().unwrap().text(), "two");
        assert_eq!(storage.keys("c").await.unwrap(), vec!["a", "b", "k"]);

        assert!(storage.delete("c").await.unwrap());
        assert!(!storage.has("c").await.unwrap());
        assert_eq!(storage.count("c").await.unwrap(), 0);
        assert!(!storage.delete("c").await.unwrap());
    }

    #[tokio::test]
    async fn backs_a_generation_store() {
        let storage = Arc::new(SqliteCacheStorage::in_memory().await.unwrap());
        let old = CacheStore::new(storage.clone(), CacheGeneration::new("tether", "v1"));
        old.put(CacheKind::Static, "k", &FetchResponse::ok()).await.unwrap();

        let new = CacheStore::new(storage.clone(), CacheGeneration::new("tether", "v2"));
        let deleted = new.activate().await.unwrap();

        assert_eq!(deleted, vec!["tether-static-v1".to_string()]);
        assert_eq!(
            storage.cache_names().await.unwrap(),
            vec!["tether-api-v2".to_string(), "tether-static-v2".to_string()]
        );
    }
}

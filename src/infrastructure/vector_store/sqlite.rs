use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{
    ensure_dimension,
    ports::{VectorStore, EMBED_DIM_KEY},
    ChunkRecord, DomainError, Embedding, StoreSnapshot,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS docs (
    id     TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL,
    text   TEXT NOT NULL,
    embed  BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS meta (
    k TEXT PRIMARY KEY,
    v TEXT NOT NULL
);";

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        DomainError::storage(err.to_string())
    }
}

/// Vector store backed by a single SQLite file.
///
/// Every operation opens its own connection on the blocking pool and closes it
/// when done; concurrent callers are serialized only by SQLite's locking.
pub struct SqliteVectorStore {
    path: PathBuf,
}

impl SqliteVectorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run<T, F>(&self, op: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&path)?;
            op(&mut conn)
        })
        .await
        .map_err(|e| DomainError::internal(format!("storage task failed: {e}")))?
    }
}

fn open_connection(path: &Path) -> Result<Connection, DomainError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DomainError::storage(format!("create {}: {e}", parent.display()))
            })?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/// Dimension the store is committed to: the recorded `embed_dim`, else the
/// width of any row already present.
fn stored_dimension(conn: &Connection) -> Result<Option<usize>, DomainError> {
    let recorded: Option<String> = conn
        .query_row(
            "SELECT v FROM meta WHERE k = ?1",
            params![EMBED_DIM_KEY],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(dim) = recorded.and_then(|v| v.parse::<usize>().ok()) {
        return Ok(Some(dim));
    }

    let bytes: Option<i64> = conn
        .query_row("SELECT length(embed) FROM docs LIMIT 1", [], |r| r.get(0))
        .optional()?;
    Ok(bytes.map(|b| b as usize / 4))
}

fn remove_if_exists(path: &Path) -> Result<(), DomainError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DomainError::storage(format!(
            "remove {}: {e}",
            path.display()
        ))),
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn initialize(&self) -> Result<(), DomainError> {
        self.run(|conn| Ok(conn.execute_batch(SCHEMA)?)).await
    }

    async fn upsert(&self, rows: &[ChunkRecord]) -> Result<(), DomainError> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows = rows.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            ensure_dimension(&rows, stored_dimension(&tx)?)?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO docs (id, doc_id, text, embed) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for row in &rows {
                    stmt.execute(params![
                        row.id,
                        row.document_id,
                        row.text,
                        row.embedding.to_le_bytes()
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn scan_all(&self) -> Result<StoreSnapshot, DomainError> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT id, doc_id, text, embed FROM docs ORDER BY rowid")?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            if raw.is_empty() {
                return Ok(StoreSnapshot::empty());
            }

            let records = raw
                .into_iter()
                .map(|(id, document_id, text, blob)| {
                    Ok(ChunkRecord {
                        id,
                        document_id,
                        text,
                        embedding: Embedding::from_le_bytes(&blob)?,
                    })
                })
                .collect::<Result<Vec<_>, DomainError>>()?;

            StoreSnapshot::from_records(records)
        })
        .await
    }

    async fn count(&self) -> Result<usize, DomainError> {
        self.run(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM docs", [], |r| r.get(0))?;
            Ok(n as usize)
        })
        .await
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>, DomainError> {
        let key = key.to_string();
        self.run(move |conn| {
            Ok(conn
                .query_row("SELECT v FROM meta WHERE k = ?1", params![key], |r| r.get(0))
                .optional()?)
        })
        .await
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO meta (k, v) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn wipe(&self) -> Result<(), DomainError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            remove_if_exists(&path)?;
            let mut journal = path.clone().into_os_string();
            journal.push("-journal");
            remove_if_exists(Path::new(&journal))?;

            let conn = open_connection(&path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| DomainError::internal(format!("storage task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(doc: &str, index: usize, text: &str, vec: Vec<f32>) -> ChunkRecord {
        ChunkRecord::new(doc, index, text, Embedding::new(vec))
    }

    async fn store() -> (tempfile::TempDir, SqliteVectorStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::new(dir.path().join("nested").join("embeddings.db"));
        store.initialize().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (_dir, store) = store().await;
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_scan_returns_placeholder() {
        let (_dir, store) = store().await;
        let snapshot = store.scan_all().await.unwrap();

        assert!(snapshot.is_empty());
        assert!(snapshot.document_ids.is_empty());
        assert_eq!(snapshot.matrix.rows(), 0);
        assert_eq!(snapshot.matrix.cols(), 1);
    }

    #[tokio::test]
    async fn test_upsert_and_scan() {
        let (_dir, store) = store().await;
        store
            .upsert(&[
                record("a.md", 0, "alpha", vec![1.0, 0.0, 0.0]),
                record("a.md", 1, "beta", vec![0.0, 1.0, 0.0]),
                record("b.txt", 0, "gamma", vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        let snapshot = store.scan_all().await.unwrap();
        assert_eq!(snapshot.ids, vec!["a.md-0", "a.md-1", "b.txt-0"]);
        assert_eq!(snapshot.document_ids, vec!["a.md", "a.md", "b.txt"]);
        assert_eq!(snapshot.texts, vec!["alpha", "beta", "gamma"]);
        assert_eq!(snapshot.matrix.rows(), 3);
        assert_eq!(snapshot.matrix.cols(), 3);
        assert_eq!(snapshot.matrix.row(2), Some(&[0.0, 0.0, 1.0][..]));
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let (_dir, store) = store().await;
        store
            .upsert(&[record("a.md", 0, "old", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&[record("a.md", 0, "new", vec![0.0, 1.0])])
            .await
            .unwrap();

        let snapshot = store.scan_all().await.unwrap();
        assert_eq!(snapshot.ids, vec!["a.md-0"]);
        assert_eq!(snapshot.texts, vec!["new"]);
        assert_eq!(snapshot.matrix.row(0), Some(&[0.0, 1.0][..]));
    }

    #[tokio::test]
    async fn test_meta_round_trip() {
        let (_dir, store) = store().await;
        assert_eq!(store.get_meta(EMBED_DIM_KEY).await.unwrap(), None);

        store.set_meta(EMBED_DIM_KEY, "768").await.unwrap();
        store.set_meta(EMBED_DIM_KEY, "1536").await.unwrap();
        assert_eq!(
            store.get_meta(EMBED_DIM_KEY).await.unwrap().as_deref(),
            Some("1536")
        );
    }

    #[tokio::test]
    async fn test_wipe_removes_rows_and_meta() {
        let (_dir, store) = store().await;
        store
            .upsert(&[record("a.md", 0, "alpha", vec![1.0])])
            .await
            .unwrap();
        store.set_meta(EMBED_DIM_KEY, "1").await.unwrap();

        store.wipe().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.get_meta(EMBED_DIM_KEY).await.unwrap(), None);
        assert!(store.scan_all().await.unwrap().matrix.is_empty());
    }

    #[tokio::test]
    async fn test_wipe_without_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::new(dir.path().join("fresh.db"));
        store.wipe().await.unwrap();
        assert!(store.path().exists());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_rejects_dimension_other_than_recorded() {
        let (_dir, store) = store().await;
        store.set_meta(EMBED_DIM_KEY, "2").await.unwrap();
        store
            .upsert(&[record("a.md", 0, "x", vec![1.0, 0.0])])
            .await
            .unwrap();

        let result = store
            .upsert(&[
                record("b.md", 0, "fits", vec![0.0, 1.0]),
                record("b.md", 1, "too wide", vec![1.0, 0.0, 0.0]),
            ])
            .await;

        assert!(matches!(result, Err(DomainError::Storage(_))));
        // the whole batch is rolled back
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.scan_all().await.unwrap().matrix.cols(), 2);
    }

    #[tokio::test]
    async fn test_upsert_without_meta_follows_existing_rows() {
        let (_dir, store) = store().await;
        store
            .upsert(&[record("a.md", 0, "x", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        assert!(store
            .upsert(&[record("a.md", 1, "y", vec![1.0, 0.0])])
            .await
            .is_err());
        assert!(store
            .upsert(&[
                record("b.md", 0, "p", vec![1.0, 0.0, 0.0]),
                record("b.md", 1, "q", vec![1.0]),
            ])
            .await
            .is_err());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scan_rejects_mixed_dimensions() {
        let (_dir, store) = store().await;
        let rows = vec![
            record("a.md", 0, "x", vec![1.0, 0.0]),
            record("a.md", 1, "y", vec![1.0, 0.0, 0.0]),
        ];
        // written behind the store's back, as an older build could have
        store
            .run(move |conn| {
                for row in &rows {
                    conn.execute(
                        "INSERT INTO docs (id, doc_id, text, embed) VALUES (?1, ?2, ?3, ?4)",
                        params![row.id, row.document_id, row.text, row.embedding.to_le_bytes()],
                    )?;
                }
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(
            store.scan_all().await,
            Err(DomainError::Storage(_))
        ));
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::{
    chunk_text,
    ports::{EmbeddingService, VectorStore, EMBED_DIM_KEY},
    ChunkRecord, DomainError,
};

const KB_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Outcome of the startup pass over the knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub dimension: usize,
    /// The store was wiped because its recorded dimension no longer matched.
    pub rebuilt: bool,
    pub files_ingested: usize,
    pub chunks_ingested: usize,
    /// Ingestion was skipped because the store already held rows.
    pub skipped: bool,
}

/// Brings the vector store in line with the embedding backend and fills it
/// from the knowledge-base directory when empty.
pub struct IngestionService {
    embedding: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorStore>,
    kb_dir: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IngestionService {
    pub fn new(
        embedding: Arc<dyn EmbeddingService>,
        store: Arc<dyn VectorStore>,
        kb_dir: impl Into<PathBuf>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            embedding,
            store,
            kb_dir: kb_dir.into(),
            chunk_size,
            chunk_overlap,
        }
    }

    #[instrument(skip(self), fields(kb_dir = %self.kb_dir.display()))]
    pub async fn bootstrap(&self) -> Result<BootstrapReport, DomainError> {
        self.store.initialize().await?;

        let dimension = self.embedding.probe_dimension().await?;
        let rebuilt = self.reconcile_dimension(dimension).await?;

        let mut report = BootstrapReport {
            dimension,
            rebuilt,
            ..Default::default()
        };

        let existing = self.store.count().await?;
        if existing > 0 {
            info!(chunks = existing, "store already populated, skipping ingestion");
            report.skipped = true;
            return Ok(report);
        }

        let (files, chunks) = self.ingest_all(dimension).await?;
        report.files_ingested = files;
        report.chunks_ingested = chunks;

        info!(dimension, rebuilt, files, chunks, "knowledge base ready");
        Ok(report)
    }

    /// Records `dimension` in the store metadata, wiping the store first when
    /// it was built with a different one. Returns whether a wipe happened.
    pub async fn reconcile_dimension(&self, dimension: usize) -> Result<bool, DomainError> {
        let stored = self.store.get_meta(EMBED_DIM_KEY).await?;

        let rebuilt = match stored.as_deref().map(str::parse::<usize>) {
            None => false,
            Some(Ok(d)) if d == dimension => return Ok(false),
            Some(Ok(d)) => {
                warn!(stored = d, probed = dimension, "embedding dimension changed, rebuilding store");
                true
            }
            Some(Err(_)) => {
                warn!(stored = ?stored, probed = dimension, "unreadable embedding dimension, rebuilding store");
                true
            }
        };

        if rebuilt {
            self.store.wipe().await?;
            self.store.initialize().await?;
        }
        self.store
            .set_meta(EMBED_DIM_KEY, &dimension.to_string())
            .await?;
        Ok(rebuilt)
    }

    /// Ingests every knowledge-base file. Returns `(files, chunks)`.
    pub async fn ingest_all(&self, dimension: usize) -> Result<(usize, usize), DomainError> {
        let files = list_kb_files(&self.kb_dir).await?;
        if files.is_empty() {
            warn!(dir = %self.kb_dir.display(), "knowledge base directory has no .txt or .md files");
            return Ok((0, 0));
        }

        let mut ingested = 0;
        let mut chunks = 0;
        for path in &files {
            let count = self.ingest_file(path, dimension).await?;
            if count > 0 {
                ingested += 1;
                chunks += count;
            }
        }
        Ok((ingested, chunks))
    }

    /// Chunks, embeds, and stores one file under ids `<file name>-<i>`.
    /// Nothing is written unless every vector has `dimension` entries.
    #[instrument(skip(self, path), fields(file = %path.display()))]
    pub async fn ingest_file(&self, path: &Path, dimension: usize) -> Result<usize, DomainError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DomainError::storage(format!("read {}: {e}", path.display())))?;
        let text = String::from_utf8_lossy(&bytes);

        if text.trim().is_empty() {
            warn!("skipping empty file");
            return Ok(0);
        }

        let document_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let pieces = chunk_text(&text, self.chunk_size, self.chunk_overlap);
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let vectors = self.embedding.embed_batch(&refs).await?;

        if vectors.len() != pieces.len() {
            return Err(DomainError::external(format!(
                "embedding backend returned {} vectors for {} chunks",
                vectors.len(),
                pieces.len()
            )));
        }
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.dimension() != dimension)
        {
            return Err(DomainError::external(format!(
                "embedding backend returned {} dimensions for chunk {i} of {document_id}, expected {dimension}",
                v.dimension()
            )));
        }

        let rows: Vec<ChunkRecord> = pieces
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| ChunkRecord::new(document_id.as_str(), i, text, vector))
            .collect();

        self.store.upsert(&rows).await?;
        info!(document = %document_id, chunks = rows.len(), "ingested");
        Ok(rows.len())
    }
}

async fn list_kb_files(dir: &Path) -> Result<Vec<PathBuf>, DomainError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DomainError::storage(format!("create {}: {e}", dir.display())))?;

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DomainError::storage(format!("list {}: {e}", dir.display())))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DomainError::storage(format!("list {}: {e}", dir.display())))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file && has_kb_extension(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn has_kb_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| KB_EXTENSIONS.iter().any(|k| e.eq_ignore_ascii_case(k)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::KeywordEmbedding;
    use crate::domain::Embedding;
    use crate::infrastructure::{InMemoryVectorStore, SqliteVectorStore};

    fn service(
        embedding: Arc<KeywordEmbedding>,
        store: Arc<dyn VectorStore>,
        kb_dir: &Path,
    ) -> IngestionService {
        IngestionService::new(embedding, store, kb_dir, 4, 1)
    }

    #[test]
    fn test_extension_filter() {
        assert!(has_kb_extension(Path::new("a.md")));
        assert!(has_kb_extension(Path::new("b.TXT")));
        assert!(has_kb_extension(Path::new("c.Md")));
        assert!(!has_kb_extension(Path::new("d.pdf")));
        assert!(!has_kb_extension(Path::new("README")));
    }

    #[tokio::test]
    async fn test_first_bootstrap_ingests_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        let kb = dir.path().join("kb");
        std::fs::create_dir(&kb).unwrap();
        std::fs::write(kb.join("b.txt"), "rust go rust go rust go").unwrap();
        std::fs::write(kb.join("a.MD"), "python notes").unwrap();
        std::fs::write(kb.join("empty.md"), "   \n").unwrap();
        std::fs::write(kb.join("skip.pdf"), "rust").unwrap();

        let embedding = Arc::new(KeywordEmbedding::new(&["rust", "python", "go"]));
        let store = Arc::new(InMemoryVectorStore::new());
        let report = service(embedding, store.clone(), &kb)
            .bootstrap()
            .await
            .unwrap();

        assert_eq!(report.dimension, 3);
        assert!(!report.rebuilt);
        assert!(!report.skipped);
        assert_eq!(report.files_ingested, 2);
        // a.MD: 1 chunk; b.txt: 6 tokens, size 4, step 3 -> 2 chunks
        assert_eq!(report.chunks_ingested, 3);

        let snapshot = store.scan_all().await.unwrap();
        assert_eq!(snapshot.ids, vec!["a.MD-0", "b.txt-0", "b.txt-1"]);
        assert_eq!(snapshot.texts[1], "rust go rust go");
        assert_eq!(snapshot.matrix.cols(), 3);
        assert_eq!(
            store.get_meta(EMBED_DIM_KEY).await.unwrap().as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn test_populated_store_is_not_reingested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "rust").unwrap();

        let embedding = Arc::new(KeywordEmbedding::new(&["rust"]));
        let store = Arc::new(InMemoryVectorStore::new());
        store.set_meta(EMBED_DIM_KEY, "1").await.unwrap();
        store
            .upsert(&[ChunkRecord::new("old.md", 0, "old", Embedding::new(vec![1.0]))])
            .await
            .unwrap();

        let report = service(embedding.clone(), store.clone(), dir.path())
            .bootstrap()
            .await
            .unwrap();

        assert!(report.skipped);
        assert_eq!(report.chunks_ingested, 0);
        // only the dimension sentinel was embedded
        assert_eq!(embedding.embedded(), 1);
        assert_eq!(store.scan_all().await.unwrap().ids, vec!["old.md-0"]);
    }

    #[tokio::test]
    async fn test_dimension_drift_rebuilds_store() {
        let dir = tempfile::tempdir().unwrap();
        let kb = dir.path().join("kb");
        let store = Arc::new(SqliteVectorStore::new(dir.path().join("embeddings.db")));
        store.initialize().await.unwrap();
        store.set_meta(EMBED_DIM_KEY, "2").await.unwrap();
        store
            .upsert(&[
                ChunkRecord::new("a.md", 0, "x", Embedding::new(vec![1.0, 0.0])),
                ChunkRecord::new("a.md", 1, "y", Embedding::new(vec![0.0, 1.0])),
            ])
            .await
            .unwrap();

        let embedding = Arc::new(KeywordEmbedding::new(&["rust", "python", "go"]));
        let report = service(embedding, store.clone(), &kb)
            .bootstrap()
            .await
            .unwrap();

        assert!(report.rebuilt);
        assert_eq!(report.dimension, 3);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(
            store.get_meta(EMBED_DIM_KEY).await.unwrap().as_deref(),
            Some("3")
        );
        // missing knowledge-base directory is created
        assert!(kb.is_dir());
    }

    /// Reports one width for single texts and another for batches.
    struct ShiftingEmbedding;

    #[async_trait::async_trait]
    impl EmbeddingService for ShiftingEmbedding {
        async fn embed(&self, _text: &str) -> Result<Embedding, DomainError> {
            Ok(Embedding::new(vec![1.0, 0.0]))
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
            Ok(texts.iter().map(|_| Embedding::new(vec![1.0, 0.0, 0.0])).collect())
        }
    }

    #[tokio::test]
    async fn test_vectors_off_the_recorded_dimension_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "rust").unwrap();
        let store = Arc::new(InMemoryVectorStore::new());

        let svc = IngestionService::new(
            Arc::new(ShiftingEmbedding),
            store.clone(),
            dir.path(),
            4,
            1,
        );

        assert!(matches!(
            svc.bootstrap().await,
            Err(DomainError::ExternalService(_))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(
            store.get_meta(EMBED_DIM_KEY).await.unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_unparsable_dimension_rebuilds_store() {
        let dir = tempfile::tempdir().unwrap();
        let embedding = Arc::new(KeywordEmbedding::new(&["rust"]));
        let store = Arc::new(InMemoryVectorStore::new());
        store.set_meta(EMBED_DIM_KEY, "wide").await.unwrap();

        let svc = service(embedding, store.clone(), dir.path());
        assert!(svc.reconcile_dimension(1).await.unwrap());
        assert!(!svc.reconcile_dimension(1).await.unwrap());
        assert_eq!(
            store.get_meta(EMBED_DIM_KEY).await.unwrap().as_deref(),
            Some("1")
        );
    }
}

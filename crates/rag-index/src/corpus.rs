//! Immutable corpus snapshot owning chunks and both indexes.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use rag_core::{
    Chunk, ChunkRecord, CorpusStats, Embedder, IndexConfig, RagError, Result, Similarity,
};

use crate::keyword::{Bm25Params, KeywordIndex};
use crate::vector::{check_finite, VectorIndex};

/// A read-only snapshot of chunks with their keyword and vector indexes.
///
/// Updating the data means building a new snapshot; readers holding an
/// `Arc<Corpus>` keep seeing the old one.
#[derive(Debug)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
    keyword: KeywordIndex,
    vector: VectorIndex,
}

/// Accumulates chunks and validates them before building a [`Corpus`].
#[derive(Debug)]
pub struct CorpusBuilder {
    config: IndexConfig,
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
}

impl CorpusBuilder {
    /// Create an empty builder.
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Add a chunk.
    ///
    /// Rejects duplicate ids, embeddings of the wrong dimension and
    /// embeddings with NaN or infinite components.
    pub fn add(&mut self, chunk: Chunk) -> Result<()> {
        if chunk.chunk_id.is_empty() {
            return Err(RagError::invalid_argument("chunk_id must not be empty"));
        }
        if self.positions.contains_key(&chunk.chunk_id) {
            return Err(RagError::invalid_argument(format!(
                "duplicate chunk_id: {}",
                chunk.chunk_id
            )));
        }
        if chunk.embedding.len() != self.config.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.config.dimension,
                actual: chunk.embedding.len(),
            });
        }
        check_finite(&chunk.embedding, &chunk.chunk_id)?;

        self.positions
            .insert(chunk.chunk_id.clone(), self.chunks.len());
        self.chunks.push(chunk);
        Ok(())
    }

    /// Number of chunks added so far.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk has been added.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Build both indexes and freeze the snapshot.
    pub fn build(self) -> Result<Corpus> {
        let start = Instant::now();

        let keyword = KeywordIndex::build(
            Bm25Params {
                k1: self.config.bm25_k1,
                b: self.config.bm25_b,
            },
            self.chunks
                .iter()
                .map(|c| (c.chunk_id.as_str(), c.text.as_str())),
        );

        let vector = VectorIndex::build(
            self.config.dimension,
            self.config.similarity,
            self.chunks
                .iter()
                .map(|c| (c.chunk_id.as_str(), c.embedding.as_slice())),
        )?;

        info!(
            "Built corpus: {} chunks, {} terms in {}ms",
            self.chunks.len(),
            keyword.term_count(),
            start.elapsed().as_millis()
        );

        Ok(Corpus {
            chunks: self.chunks,
            positions: self.positions,
            keyword,
            vector,
        })
    }
}

impl Corpus {
    /// Start building a corpus.
    pub fn builder(config: IndexConfig) -> CorpusBuilder {
        CorpusBuilder::new(config)
    }

    /// Build a corpus from already-embedded chunks.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>, config: IndexConfig) -> Result<Self> {
        let mut builder = CorpusBuilder::new(config);
        for chunk in chunks {
            builder.add(chunk)?;
        }
        builder.build()
    }

    /// Embed ingestion records in batches and build a corpus.
    pub async fn ingest<E>(records: Vec<ChunkRecord>, embedder: &E, config: IndexConfig) -> Result<Self>
    where
        E: Embedder + ?Sized,
    {
        if embedder.dimension() != config.dimension {
            return Err(RagError::DimensionMismatch {
                expected: config.dimension,
                actual: embedder.dimension(),
            });
        }

        let batch_size = config.batch_size.max(1);
        let mut builder = CorpusBuilder::new(config);

        for batch in records.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|r| r.text.as_str()).collect();
            let embeddings = embedder.embed_documents(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(RagError::internal(format!(
                    "embedder returned {} vectors for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }

            debug!("Embedded batch of {} records", batch.len());

            for (record, embedding) in batch.iter().zip(embeddings) {
                builder.add(Chunk::new(
                    record.chunk_id.clone(),
                    record.text.clone(),
                    embedding,
                    record.source_uri.clone(),
                ))?;
            }
        }

        builder.build()
    }

    /// Read a JSONL corpus file, embed it and build a corpus.
    pub async fn load_jsonl<E>(path: impl AsRef<Path>, embedder: &E, config: IndexConfig) -> Result<Self>
    where
        E: Embedder + ?Sized,
    {
        let records = read_records(path)?;
        Self::ingest(records, embedder, config).await
    }

    /// Look up a chunk by id.
    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.positions.get(chunk_id).map(|&i| &self.chunks[i])
    }

    /// Look up a chunk that a search result refers to.
    ///
    /// A miss means an index and the chunk table disagree.
    pub fn resolve(&self, chunk_id: &str) -> Result<&Chunk> {
        self.get(chunk_id)
            .ok_or_else(|| RagError::data_consistency(chunk_id))
    }

    /// All chunks in ingestion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension.
    pub fn dimension(&self) -> usize {
        self.vector.dimension()
    }

    /// Vector similarity function.
    pub fn similarity(&self) -> Similarity {
        self.vector.similarity()
    }

    /// The keyword index.
    pub fn keyword(&self) -> &KeywordIndex {
        &self.keyword
    }

    /// The vector index.
    pub fn vector(&self) -> &VectorIndex {
        &self.vector
    }

    /// Corpus statistics.
    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            chunks: self.chunks.len(),
            terms: self.keyword.term_count(),
            dimension: self.vector.dimension(),
            similarity: self.vector.similarity(),
            avg_chunk_terms: self.keyword.avg_doc_length(),
        }
    }
}

/// Read ingestion records from a JSONL file, one object per line.
///
/// Blank lines are skipped; a malformed line fails with its line number.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<ChunkRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord = serde_json::from_str(&line).map_err(|e| {
            RagError::invalid_argument(format!("{}:{}: {}", path.display(), i + 1, e))
        })?;
        records.push(record);
    }

    info!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

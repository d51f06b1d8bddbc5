//! Exhaustive nearest-neighbor index over chunk embeddings.

use rag_core::{rank_scores, RagError, Result, ScoredChunk, Similarity};

/// Vector index with a similarity function fixed at build time.
///
/// Vectors are stored L2-normalized when the similarity is cosine, so a
/// search is a single dot product per chunk.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    similarity: Similarity,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from `(chunk_id, embedding)` pairs.
    ///
    /// Fails with `DimensionMismatch` if any embedding length differs from
    /// `dimension`, and with `InvalidArgument` on NaN or infinite components.
    pub fn build<'a, I>(dimension: usize, similarity: Similarity, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a [f32])>,
    {
        let mut ids = Vec::new();
        let mut vectors = Vec::new();

        for (chunk_id, embedding) in entries {
            if embedding.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            check_finite(embedding, chunk_id)?;
            ids.push(chunk_id.to_string());
            vectors.push(prepare(embedding, similarity));
        }

        Ok(Self {
            dimension,
            similarity,
            ids,
            vectors,
        })
    }

    /// Configured embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Similarity function.
    pub fn similarity(&self) -> Similarity {
        self.similarity
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Search for the `k` most similar chunks.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::invalid_argument("k must be >= 1"));
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        check_finite(query, "query")?;

        let query = prepare(query, self.similarity);

        Ok(rank_scores(
            self.ids
                .iter()
                .zip(&self.vectors)
                .map(|(id, vector)| (id.clone(), dot(&query, vector))),
            Some(k),
        ))
    }
}

/// NaN or infinite components would sort ahead of every real score.
pub(crate) fn check_finite(vector: &[f32], owner: &str) -> Result<()> {
    if vector.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(RagError::invalid_argument(format!(
            "embedding for {} has non-finite components",
            owner
        )))
    }
}

fn prepare(vector: &[f32], similarity: Similarity) -> Vec<f32> {
    match similarity {
        Similarity::DotProduct => vector.to_vec(),
        Similarity::Cosine => {
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                vector.iter().map(|x| x / norm).collect()
            } else {
                // zero vector stays zero: similarity 0 to everything
                vector.to_vec()
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(similarity: Similarity) -> VectorIndex {
        let entries: Vec<(&str, &[f32])> = vec![
            ("x", &[1.0, 0.0, 0.0]),
            ("y", &[0.0, 1.0, 0.0]),
            ("xy", &[1.0, 1.0, 0.0]),
            ("big", &[4.0, 0.0, 0.0]),
        ];
        VectorIndex::build(3, similarity, entries).unwrap()
    }

    #[test]
    fn test_cosine_search() {
        let results = index(Similarity::Cosine).search(&[2.0, 0.0, 0.0], 4).unwrap();

        // "big" and "x" both have cosine 1.0; tie broken by id
        assert_eq!(results[0].chunk_id, "big");
        assert_eq!(results[1].chunk_id, "x");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[2].chunk_id, "xy");
        assert_eq!(results[3].chunk_id, "y");
    }

    #[test]
    fn test_dot_product_search() {
        let results = index(Similarity::DotProduct)
            .search(&[1.0, 0.0, 0.0], 2)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "big");
        assert_eq!(results[0].score, 4.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = index(Similarity::Cosine).search(&[1.0, 0.0], 2).unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_build_rejects_wrong_dimension() {
        let entries: Vec<(&str, &[f32])> = vec![("ok", &[1.0, 0.0]), ("bad", &[1.0])];
        assert!(VectorIndex::build(2, Similarity::Cosine, entries).is_err());
    }

    #[test]
    fn test_build_rejects_non_finite_embedding() {
        let entries: Vec<(&str, &[f32])> = vec![
            ("good", &[1.0, 0.0]),
            ("nan", &[f32::NAN, 0.0]),
            ("other", &[0.0, 1.0]),
        ];
        let err = VectorIndex::build(2, Similarity::Cosine, entries).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_search_rejects_non_finite_query() {
        let index = index(Similarity::Cosine);
        for query in [[f32::INFINITY, 0.0, 0.0], [0.0, f32::NAN, 0.0]] {
            let err = index.search(&query, 4).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_ARGUMENT");
        }
    }

    #[test]
    fn test_zero_k_is_invalid() {
        assert!(index(Similarity::Cosine).search(&[1.0, 0.0, 0.0], 0).is_err());
    }

    #[test]
    fn test_zero_query_vector() {
        let results = index(Similarity::Cosine).search(&[0.0, 0.0, 0.0], 4).unwrap();
        assert!(results.iter().all(|r| r.score == 0.0));
        let ids: Vec<_> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["big", "x", "xy", "y"]);
    }
}

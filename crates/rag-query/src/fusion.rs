//! Score fusion for combining search results.

use std::collections::HashMap;

use rag_core::{rank_scores, RetrievalResult, ScoredChunk};

/// Min-max normalize the scores of one result list into `[0, 1]`.
///
/// When every candidate has the same score (including a single candidate)
/// each one normalizes to 1.0.
pub fn min_max_normalize(results: &[ScoredChunk]) -> HashMap<&str, f32> {
    let (min, max) = results
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.score), hi.max(r.score))
        });
    let range = max - min;

    results
        .iter()
        .map(|r| {
            let normalized = if range > f32::EPSILON {
                (r.score - min) / range
            } else {
                1.0
            };
            (r.chunk_id.as_str(), normalized)
        })
        .collect()
}

/// Combine semantic and keyword candidates with a weighted sum.
///
/// fused = alpha * norm(semantic) + (1 - alpha) * norm(keyword)
///
/// A chunk missing from one list contributes 0 for that term. Results are
/// sorted by fused score descending, chunk id ascending, and truncated to
/// `k`.
pub fn weighted_fusion(
    semantic: &[ScoredChunk],
    keyword: &[ScoredChunk],
    alpha: f32,
    k: usize,
) -> Vec<ScoredChunk> {
    let mut scores: HashMap<&str, f32> = HashMap::new();

    for (id, score) in min_max_normalize(semantic) {
        *scores.entry(id).or_default() += alpha * score;
    }
    for (id, score) in min_max_normalize(keyword) {
        *scores.entry(id).or_default() += (1.0 - alpha) * score;
    }

    rank_scores(
        scores.into_iter().map(|(id, score)| (id.to_string(), score)),
        Some(k),
    )
}

/// Fuse result lists using Reciprocal Rank Fusion.
///
/// RRF score = sum over lists of 1 / (rrf_k + rank), rank 1-based.
/// Higher `rrf_k` gives more weight to lower-ranked results.
pub fn reciprocal_rank_fusion(lists: &[&[ScoredChunk]], rrf_k: u32, k: usize) -> Vec<ScoredChunk> {
    let mut scores: HashMap<&str, f32> = HashMap::new();

    for list in lists {
        for (rank, scored) in list.iter().enumerate() {
            let rrf_score = 1.0 / (rrf_k as f32 + rank as f32 + 1.0);
            *scores.entry(scored.chunk_id.as_str()).or_default() += rrf_score;
        }
    }

    rank_scores(
        scores.into_iter().map(|(id, score)| (id.to_string(), score)),
        Some(k),
    )
}

/// Merge retrieval results by chunk id, keeping the maximum score.
///
/// Max is commutative, associative and idempotent, so the outcome does not
/// depend on the order in which results arrive.
pub fn merge_max<I>(results: I, limit: Option<usize>) -> RetrievalResult
where
    I: IntoIterator<Item = RetrievalResult>,
{
    let mut best: HashMap<String, f32> = HashMap::new();

    for result in results {
        for scored in result {
            best.entry(scored.chunk_id)
                .and_modify(|s| *s = s.max(scored.score))
                .or_insert(scored.score);
        }
    }

    RetrievalResult::new(rank_scores(best, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(&str, f32)]) -> Vec<ScoredChunk> {
        rank_scores(
            entries.iter().map(|(id, s)| (id.to_string(), *s)),
            None,
        )
    }

    fn ids(results: &[ScoredChunk]) -> Vec<&str> {
        results.iter().map(|r| r.chunk_id.as_str()).collect()
    }

    #[test]
    fn test_min_max_normalize() {
        let scored = list(&[("a", 10.0), ("b", 5.0), ("c", 0.0)]);
        let normalized = min_max_normalize(&scored);
        assert_eq!(normalized["a"], 1.0);
        assert_eq!(normalized["b"], 0.5);
        assert_eq!(normalized["c"], 0.0);

        let one = list(&[("a", 0.2)]);
        let single = min_max_normalize(&one);
        assert_eq!(single["a"], 1.0);

        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_weighted_fusion_missing_contributes_zero() {
        let semantic = list(&[("a", 0.9), ("b", 0.1)]);
        let keyword = list(&[("c", 7.0), ("a", 1.0)]);

        let fused = weighted_fusion(&semantic, &keyword, 0.5, 10);

        // a: 0.5 * 1 + 0.5 * 0 ; c: 0.5 * 0 + 0.5 * 1 ; b: 0
        assert_eq!(ids(&fused), vec!["a", "c", "b"]);
        assert_eq!(fused[0].score, 0.5);
        assert_eq!(fused[1].score, 0.5);
        assert_eq!(fused[2].score, 0.0);
    }

    #[test]
    fn test_weighted_fusion_alpha_monotonic() {
        // "s" leans semantic, "k" leans keyword
        let semantic = list(&[("s", 0.9), ("k", 0.2), ("z", 0.1)]);
        let keyword = list(&[("k", 9.0), ("s", 3.0), ("z", 1.0)]);

        let position = |alpha: f32, id: &str| {
            weighted_fusion(&semantic, &keyword, alpha, 10)
                .iter()
                .position(|r| r.chunk_id == id)
                .unwrap()
        };

        assert!(position(0.2, "s") > position(0.2, "k"));
        assert!(position(0.8, "s") < position(0.8, "k"));

        let mut last = usize::MAX;
        for step in 0..=10 {
            let pos = position(step as f32 / 10.0, "s");
            assert!(pos <= last);
            last = pos;
        }
    }

    #[test]
    fn test_weighted_fusion_truncation() {
        let semantic = list(&[("a", 0.9), ("b", 0.8), ("c", 0.7)]);
        let keyword = list(&[("d", 3.0), ("e", 2.0)]);
        assert_eq!(weighted_fusion(&semantic, &keyword, 0.5, 2).len(), 2);
    }

    #[test]
    fn test_rrf_multiple_lists() {
        let first = list(&[("a", 0.9), ("b", 0.8), ("c", 0.7)]);
        let second = list(&[("b", 0.95), ("a", 0.85), ("d", 0.75)]);

        let fused = reciprocal_rank_fusion(&[&first, &second], 60, 10);

        // a and b tie on RRF score; tie broken by id
        assert_eq!(ids(&fused), vec!["a", "b", "c", "d"]);
        assert_eq!(fused[0].rank, 1);
    }

    #[test]
    fn test_rrf_truncation() {
        let only = list(&[("a", 0.9), ("b", 0.8), ("c", 0.7), ("d", 0.6), ("e", 0.5)]);
        assert_eq!(reciprocal_rank_fusion(&[&only], 60, 3).len(), 3);
    }

    #[test]
    fn test_merge_max_keeps_highest() {
        let first = RetrievalResult::new(list(&[("a", 0.4), ("b", 0.9)]));
        let second = RetrievalResult::new(list(&[("a", 0.8), ("c", 0.1)]));

        let merged = merge_max(vec![first, second], None);

        assert_eq!(merged.chunk_ids(), vec!["b", "a", "c"]);
        assert_eq!(merged.score_of("a"), Some(0.8));
        assert_eq!(merged.chunks[2].rank, 3);
    }

    #[test]
    fn test_merge_max_order_independent() {
        let results = vec![
            RetrievalResult::new(list(&[("a", 0.4), ("b", 0.9), ("x", 0.5)])),
            RetrievalResult::new(list(&[("a", 0.8), ("c", 0.1)])),
            RetrievalResult::new(list(&[("c", 0.6), ("b", 0.2), ("x", 0.5)])),
        ];

        let expected = merge_max(results.clone(), None);
        let permutations = [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in permutations {
            let permuted: Vec<_> = order.iter().map(|&i| results[i].clone()).collect();
            assert_eq!(merge_max(permuted, None), expected);
        }

        // idempotent
        let doubled: Vec<_> = results.iter().chain(results.iter()).cloned().collect();
        assert_eq!(merge_max(doubled, None), expected);
    }

    #[test]
    fn test_merge_max_limit() {
        let first = RetrievalResult::new(list(&[("a", 0.4), ("b", 0.9), ("c", 0.3)]));
        let merged = merge_max(vec![first], Some(2));
        assert_eq!(merged.chunk_ids(), vec!["b", "a"]);
    }
}

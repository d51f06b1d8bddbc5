//! Grounded answer synthesis.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use rag_core::{
    ContextBudget, GeneratedAnswer, GenerationConfig, Generator, RagError, Result,
    RetrievalResult,
};
use rag_index::Corpus;

use crate::generate_with_timeout;
use crate::prompt::{context_block, grounding_prompt};

const BLOCK_SEPARATOR: &str = "\n\n";

/// Context packed into a grounding prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    /// Context blocks joined by blank lines.
    pub context: String,

    /// Chunk ids included, in inclusion order.
    pub citations: Vec<String>,

    /// Budget consumed, in the budget's unit.
    pub used: usize,
}

/// Answers a query from retrieved chunks.
pub struct AnswerSynthesizer<G: ?Sized> {
    corpus: Arc<Corpus>,
    generator: Arc<G>,
    temperature: f32,
    timeout: Duration,
}

impl<G> AnswerSynthesizer<G>
where
    G: Generator + ?Sized,
{
    /// Create a synthesizer using the temperature and timeout of `config`.
    pub fn new(corpus: Arc<Corpus>, generator: Arc<G>, config: &GenerationConfig) -> Self {
        Self {
            corpus,
            generator,
            temperature: config.temperature,
            timeout: config.timeout(),
        }
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pack chunks in rank order until the next one would exceed `budget`.
    ///
    /// The first chunk that does not fit ends assembly; chunks are never
    /// cut mid-text.
    pub fn assemble(&self, result: &RetrievalResult, budget: ContextBudget) -> Result<AssembledContext> {
        let mut context = String::new();
        let mut citations = Vec::new();
        let mut used = 0usize;

        for scored in result.iter() {
            let chunk = self.corpus.resolve(&scored.chunk_id)?;
            let block = context_block(chunk);
            let cost = if citations.is_empty() {
                budget.cost(&block)
            } else {
                budget.cost(BLOCK_SEPARATOR) + budget.cost(&block)
            };

            if used + cost > budget.limit() {
                debug!(
                    "Context budget {} reached at rank {}, dropping {} chunk(s)",
                    budget.limit(),
                    scored.rank,
                    result.len() - citations.len()
                );
                break;
            }

            if !citations.is_empty() {
                context.push_str(BLOCK_SEPARATOR);
            }
            context.push_str(&block);
            citations.push(scored.chunk_id.clone());
            used += cost;
        }

        Ok(AssembledContext {
            context,
            citations,
            used,
        })
    }

    /// Generate an answer to `query` grounded on `result`.
    pub async fn synthesize(
        &self,
        query: &str,
        result: &RetrievalResult,
        budget: ContextBudget,
    ) -> Result<GeneratedAnswer> {
        let start = Instant::now();

        let assembled = self.assemble(result, budget)?;
        if assembled.citations.is_empty() {
            warn!("No retrieved chunk fits the context budget; answering without context");
        }

        let prompt = grounding_prompt(query, &assembled.context);
        let text =
            generate_with_timeout(self.generator.as_ref(), &prompt, self.temperature, self.timeout)
                .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::generation(format!(
                "{} returned an empty answer",
                self.generator.model_name()
            )));
        }

        info!(
            "Synthesized answer from {} chunk(s) in {}ms",
            assembled.citations.len(),
            start.elapsed().as_millis()
        );

        Ok(GeneratedAnswer {
            text: text.to_string(),
            citations: assembled.citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedGenerator;
    use rag_core::{rank_scores, Chunk, IndexConfig};

    fn corpus() -> Arc<Corpus> {
        let chunks = vec![
            Chunk::new("a", "Operating lease cost was $22.4 million.", vec![1.0, 0.0], ""),
            Chunk::new("b", "Sublease income was $1.1 million.", vec![0.0, 1.0], ""),
            Chunk::new("c", "Lease liabilities totaled $180.3 million.", vec![1.0, 1.0], ""),
        ];
        Arc::new(
            Corpus::from_chunks(
                chunks,
                IndexConfig {
                    dimension: 2,
                    ..Default::default()
                },
            )
            .unwrap(),
        )
    }

    fn result(ids: &[&str]) -> RetrievalResult {
        RetrievalResult::new(rank_scores(
            ids.iter()
                .enumerate()
                .map(|(i, id)| (id.to_string(), 1.0 - i as f32 * 0.1)),
            None,
        ))
    }

    fn synthesizer(generator: Arc<ScriptedGenerator>) -> AnswerSynthesizer<ScriptedGenerator> {
        AnswerSynthesizer::new(corpus(), generator, &GenerationConfig::default())
    }

    #[test]
    fn test_assemble_respects_budget() {
        let synth = synthesizer(Arc::new(ScriptedGenerator::repeating("ok")));
        let retrieved = result(&["a", "b", "c"]);

        // "[a]\n" + 39 chars = 43; the second block adds 2 + 37
        let assembled = synth
            .assemble(&retrieved, ContextBudget::Characters(90))
            .unwrap();
        assert_eq!(assembled.citations, vec!["a", "b"]);
        assert!(assembled.used <= 90);
        assert!(!assembled.context.contains("180.3"));

        let all = synth
            .assemble(&retrieved, ContextBudget::Characters(10_000))
            .unwrap();
        assert_eq!(all.citations, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_assemble_stops_at_first_overflow() {
        let synth = synthesizer(Arc::new(ScriptedGenerator::repeating("ok")));
        let assembled = synth
            .assemble(&result(&["c", "a"]), ContextBudget::Characters(20))
            .unwrap();
        assert!(assembled.citations.is_empty());
        assert!(assembled.context.is_empty());
    }

    #[test]
    fn test_assemble_dangling_id() {
        let synth = synthesizer(Arc::new(ScriptedGenerator::repeating("ok")));
        let err = synth
            .assemble(&result(&["a", "ghost"]), ContextBudget::Characters(10_000))
            .unwrap_err();
        assert_eq!(err.error_code(), "DATA_CONSISTENCY_ERROR");
    }

    #[tokio::test]
    async fn test_citations_are_included_chunks() {
        let generator = Arc::new(ScriptedGenerator::repeating("  $22.4 million [a]  "));
        let synth = synthesizer(generator.clone());

        let answer = synth
            .synthesize(
                "What was the operating lease cost?",
                &result(&["a", "b", "c"]),
                ContextBudget::Characters(90),
            )
            .await
            .unwrap();

        assert_eq!(answer.text, "$22.4 million [a]");
        assert_eq!(answer.citations, vec!["a", "b"]);

        let prompt = &generator.prompts()[0];
        for id in &answer.citations {
            assert!(prompt.contains(&format!("[{}]", id)));
        }
        assert!(!prompt.contains("[c]"));
    }

    #[tokio::test]
    async fn test_token_budget() {
        let synth = synthesizer(Arc::new(ScriptedGenerator::repeating("ok")));
        // 43 chars -> 11 tokens per block
        let answer = synth
            .synthesize("q", &result(&["a", "b"]), ContextBudget::Tokens(12))
            .await
            .unwrap();
        assert_eq!(answer.citations, vec!["a"]);
    }

    #[tokio::test]
    async fn test_empty_answer_is_error() {
        let synth = synthesizer(Arc::new(ScriptedGenerator::repeating(" \n ")));
        let err = synth
            .synthesize("q", &result(&["a"]), ContextBudget::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "GENERATION_ERROR");
    }

    #[tokio::test]
    async fn test_generator_failure() {
        let generator = Arc::new(ScriptedGenerator::new(Vec::<String>::new()).then_fail("503"));
        let err = synthesizer(generator)
            .synthesize("q", &result(&["a"]), ContextBudget::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation { .. }));
    }
}

//! rag-generate - Generation collaborators and the components built on them
//!
//! # Features
//!
//! - [`OllamaGenerator`]: HTTP client for an Ollama-compatible `/api/generate`
//! - [`ScriptedGenerator`]: replays canned responses, for tests and offline use
//! - [`QueryExpander`]: paraphrases a query into `n` distinct variants
//! - [`AnswerSynthesizer`]: packs ranked chunks into a grounding prompt under
//!   a context budget and returns the answer with its citations
//!
//! Every generation call is bounded by a timeout; a timed-out or failed
//! call surfaces as [`rag_core::RagError::Generation`].

mod expander;
mod ollama;
mod prompt;
mod scripted;
mod synthesizer;

pub use expander::{parse_variants, QueryExpander};
pub use ollama::OllamaGenerator;
pub use prompt::{context_block, expansion_prompt, grounding_prompt};
pub use scripted::ScriptedGenerator;
pub use synthesizer::{AnswerSynthesizer, AssembledContext};

// Re-export the Generator trait for convenience
pub use rag_core::Generator;

use std::time::Duration;

use rag_core::{RagError, Result};

/// Call a generator under a timeout, folding every failure into a
/// generation error.
pub(crate) async fn generate_with_timeout<G>(
    generator: &G,
    prompt: &str,
    temperature: f32,
    timeout: Duration,
) -> Result<String>
where
    G: Generator + ?Sized,
{
    match tokio::time::timeout(timeout, generator.generate(prompt, temperature)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e @ RagError::Generation { .. })) => Err(e),
        Ok(Err(e)) => Err(RagError::generation(format!(
            "{} failed: {}",
            generator.model_name(),
            e
        ))),
        Err(_) => Err(RagError::generation(format!(
            "{} timed out after {:?}",
            generator.model_name(),
            timeout
        ))),
    }
}

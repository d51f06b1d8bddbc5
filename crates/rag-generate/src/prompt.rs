//! Prompt templates.

use rag_core::Chunk;

/// Prompt asking the model for `n` paraphrases of `query`, one per line.
pub fn expansion_prompt(query: &str, n: usize) -> String {
    format!(
        r#"You are helping a search system find documents that answer a user's question.

Write {n} different versions of the question below. Each version must ask for exactly the same facts as the original: keep every entity, number, date and constraint, and do not add new ones. Vary the wording and the perspective so that each version could match differently phrased passages.

Output only the {n} questions, one per line, with no numbering and no commentary.

Question: {query}"#,
        n = n,
        query = query.trim(),
    )
}

/// Render one chunk as a context block.
pub fn context_block(chunk: &Chunk) -> String {
    if chunk.source_uri.is_empty() {
        format!("[{}]\n{}", chunk.chunk_id, chunk.text.trim())
    } else {
        format!(
            "[{}] ({})\n{}",
            chunk.chunk_id,
            chunk.source_uri,
            chunk.text.trim()
        )
    }
}

/// Grounding prompt: answer only from `context`.
pub fn grounding_prompt(query: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no context was retrieved)"
    } else {
        context
    };

    format!(
        r#"Answer the question using only the information in the context below. Each context passage starts with its id in square brackets.

If the context does not contain the answer, reply that you cannot answer from the provided documents. Do not use outside knowledge and do not guess figures.

Context:
{context}

Question: {query}

Answer:"#,
        context = context,
        query = query.trim(),
    )
}

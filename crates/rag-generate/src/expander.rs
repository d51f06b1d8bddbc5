//! Multi-query expansion: paraphrase a query through the generator.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use rag_core::{GenerationConfig, Generator, RagError, Result};

use crate::generate_with_timeout;
use crate::prompt::expansion_prompt;

/// Generates paraphrased variants of a query.
pub struct QueryExpander<G: ?Sized> {
    generator: Arc<G>,
    temperature: f32,
    timeout: Duration,
}

impl<G> QueryExpander<G>
where
    G: Generator + ?Sized,
{
    /// Create an expander using the temperature and timeout of `config`.
    pub fn new(generator: Arc<G>, config: &GenerationConfig) -> Self {
        Self {
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

    /// Produce exactly `n` distinct paraphrases of `query`.
    ///
    /// Fails with a generation error when the model returns fewer than `n`
    /// usable variants.
    pub async fn expand(&self, query: &str, n: usize) -> Result<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        if query.trim().is_empty() {
            return Err(RagError::invalid_argument("query must not be empty"));
        }

        let start = Instant::now();
        let prompt = expansion_prompt(query, n);
        let response =
            generate_with_timeout(self.generator.as_ref(), &prompt, self.temperature, self.timeout)
                .await?;

        let mut variants = parse_variants(&response, query);
        debug!("Parsed {} variants: {:?}", variants.len(), variants);

        if variants.len() < n {
            return Err(RagError::generation(format!(
                "expected {} distinct query variants, got {}",
                n,
                variants.len()
            )));
        }
        variants.truncate(n);

        info!(
            "Expanded query into {} variants in {}ms",
            n,
            start.elapsed().as_millis()
        );

        Ok(variants)
    }
}

/// Extract distinct, non-empty query variants from a model response.
///
/// When any line carries a list marker, only marked lines count, so an
/// unmarked preamble or closing remark is never taken as a variant. Otherwise
/// every line counts except preamble lines ending in `:`. Quotes are stripped
/// and case-insensitive duplicates and copies of `original` are dropped.
pub fn parse_variants(response: &str, original: &str) -> Vec<String> {
    let lines: Vec<(Option<&str>, &str)> = response
        .lines()
        .map(|line| (list_item(line.trim()), line.trim()))
        .collect();
    let marked_only = lines.iter().any(|(item, _)| item.is_some());

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(normalize(original));

    let mut variants = Vec::new();
    for (item, line) in lines {
        let line = match item {
            Some(item) => item,
            None if marked_only => continue,
            None => line,
        };
        let line = strip_quotes(line).trim();
        if line.is_empty() || line.ends_with(':') {
            continue;
        }
        if seen.insert(normalize(line)) {
            variants.push(line.to_string());
        }
    }

    variants
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// The text after a leading `-`, `*`, `•`, `1.` or `1)` list marker, or
/// `None` if the line has no marker.
fn list_item(line: &str) -> Option<&str> {
    for bullet in ['-', '*', '•'] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return Some(rest.trim_start());
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return Some(rest.trim_start());
        }
    }

    None
}

fn strip_quotes(line: &str) -> &str {
    let quotes: &[char] = &['"', '\'', '“', '”'];
    if line.len() >= 2 && line.starts_with(quotes) && line.ends_with(quotes) {
        line.trim_matches(quotes)
    } else {
        line
    }
}

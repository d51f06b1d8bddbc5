//! Scripted generator that replays canned responses.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use rag_core::{Generator, RagError, Result};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// A generator for tests and offline runs that doesn't require a model.
///
/// Replies are consumed in order; once the script is exhausted the
/// fallback (if any) is returned, otherwise the call fails. Every prompt
/// is recorded.
#[derive(Debug)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<(String, f32)>>,
}

impl ScriptedGenerator {
    /// Create a generator replaying `replies` in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Reply::Text(r.into())).collect()),
            fallback: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a generator that always answers `text`.
    pub fn repeating(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Queue a failing reply.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Reply::Fail(message.into()));
        }
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.iter().map(|(prompt, _)| prompt.clone()).collect())
            .unwrap_or_default()
    }

    /// Temperatures received so far.
    pub fn temperatures(&self) -> Vec<f32> {
        self.prompts
            .lock()
            .map(|p| p.iter().map(|(_, t)| *t).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| RagError::internal("prompt log poisoned"))?
            .push((prompt.to_string(), temperature));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .lock()
            .map_err(|_| RagError::internal("reply script poisoned"))?
            .pop_front();

        match (reply, &self.fallback) {
            (Some(Reply::Text(text)), _) => Ok(text),
            (Some(Reply::Fail(message)), _) => Err(RagError::generation(message)),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(RagError::generation("script exhausted")),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let generator = ScriptedGenerator::new(["one", "two"]).then_fail("down");

        assert_eq!(generator.generate("p1", 0.0).await.unwrap(), "one");
        assert_eq!(generator.generate("p2", 0.5).await.unwrap(), "two");
        assert!(generator.generate("p3", 0.0).await.is_err());
        assert!(generator.generate("p4", 0.0).await.is_err());

        assert_eq!(generator.prompts(), vec!["p1", "p2", "p3", "p4"]);
        assert_eq!(generator.temperatures()[1], 0.5);
    }

    #[tokio::test]
    async fn test_repeating() {
        let generator = ScriptedGenerator::repeating("same");
        assert_eq!(generator.generate("a", 0.0).await.unwrap(), "same");
        assert_eq!(generator.generate("b", 0.0).await.unwrap(), "same");
    }
}

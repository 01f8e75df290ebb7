//! Dummy LLM provider — echoes input back prefixed with `[echo]`.
//! Used for running the services without a real API key.
//!
//! Embeddings are hashed bag-of-words vectors: texts sharing words score
//! higher under cosine similarity, which is enough to exercise retrieval.

use futures_util::StreamExt;
use futures_util::stream;

use crate::llm::{AssistantMessage, ChatMessage, ModelOutput, ProviderError, Role, TextStream, ToolDefinition};

/// Width of the hashed embedding vectors.
pub const EMBEDDING_DIM: usize = 64;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    /// Echo the last user message as a final answer. Never requests tools.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelOutput, ProviderError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(ModelOutput::Chat(AssistantMessage::text(format!("[echo] {last_user}"))))
    }

    /// Stream the echoed prompt word by word.
    pub async fn complete_stream(&self, prompt: &str) -> Result<TextStream, ProviderError> {
        let text = format!("[echo] {prompt}");
        let pieces: Vec<Result<String, ProviderError>> = text
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(stream::iter(pieces).boxed())
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|text| hashed_embedding(text)).collect())
    }
}

/// L2-normalised hashed bag-of-words vector over lowercase alphanumeric words.
pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let slot = fnv1a(&word.to_lowercase()) as usize % EMBEDDING_DIM;
        vector[slot] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

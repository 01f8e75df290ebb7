//! Scripted provider — replays a fixed queue of responses.
//!
//! Gives tests full control over what "the model" says on each call, and
//! records every chat prompt it receives for later inspection. When the
//! queue runs dry, `chat` fails with a request error.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use futures_util::stream;

use crate::llm::{
    AssistantMessage, ChatMessage, ModelOutput, ProviderError, TextStream, ToolCallRequest,
    ToolDefinition,
};

use super::dummy::hashed_embedding;

/// One queued response.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Output(ModelOutput),
    /// Simulate a safety-filter rejection.
    Blocked,
    /// Simulate a transport failure.
    Fail(String),
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Output(ModelOutput::Chat(AssistantMessage::text(content)))
    }

    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Self {
        Self::Output(ModelOutput::Chat(AssistantMessage {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }))
    }

    /// A tool call whose argument string is passed through untouched.
    pub fn raw_tool_call(id: &str, name: &str, arguments: &str) -> Self {
        Self::Output(ModelOutput::Chat(AssistantMessage {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }))
    }

    pub fn completion(text: impl Into<String>) -> Self {
        Self::Output(ModelOutput::Completion(text.into()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedProvider {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = ScriptedReply>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append more replies to the end of the queue.
    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    /// Number of chat calls received so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Snapshot of every chat prompt received, in call order.
    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn next_reply(&self) -> Result<ScriptedReply, ProviderError> {
        self.replies
            .lock()
            .map_err(|_| ProviderError::Request("scripted provider lock poisoned".into()))?
            .pop_front()
            .ok_or_else(|| ProviderError::Request("scripted provider exhausted".into()))
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelOutput, ProviderError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(messages.to_vec());
        }
        match self.next_reply()? {
            ScriptedReply::Output(out) => Ok(out),
            ScriptedReply::Blocked => Err(ProviderError::Blocked("scripted block".into())),
            ScriptedReply::Fail(msg) => Err(ProviderError::Request(msg)),
        }
    }

    /// Stream the next queued reply's text as a single fragment.
    pub async fn complete_stream(&self, _prompt: &str) -> Result<TextStream, ProviderError> {
        let text = match self.next_reply()? {
            ScriptedReply::Output(ModelOutput::Chat(msg)) => msg.content,
            ScriptedReply::Output(ModelOutput::Completion(text)) => text,
            ScriptedReply::Blocked => return Err(ProviderError::Blocked("scripted block".into())),
            ScriptedReply::Fail(msg) => return Err(ProviderError::Request(msg)),
        };
        Ok(stream::iter(vec![Ok(text)]).boxed())
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|t| hashed_embedding(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_exhausts() {
        let p = ScriptedProvider::new([ScriptedReply::text("one"), ScriptedReply::Blocked]);
        let first = p.chat(&[ChatMessage::user("hi")], &[]).await.unwrap();
        assert_eq!(first, ModelOutput::Chat(AssistantMessage::text("one")));
        assert!(matches!(
            p.chat(&[], &[]).await,
            Err(ProviderError::Blocked(_))
        ));
        assert!(matches!(
            p.chat(&[], &[]).await,
            Err(ProviderError::Request(msg)) if msg.contains("exhausted")
        ));
        assert_eq!(p.calls(), 3);
        assert_eq!(p.prompts()[0][0].content, "hi");
    }

    #[tokio::test]
    async fn clones_share_the_queue() {
        let p = ScriptedProvider::new([]);
        let clone = p.clone();
        clone.push(ScriptedReply::text("shared"));
        assert_eq!(p.remaining(), 1);
    }
}

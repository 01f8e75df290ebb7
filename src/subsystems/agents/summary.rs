//! History budget: fold the oldest turns into a model-written summary.
//!
//! Token counts are estimated as ⌈chars / 4⌉ over message contents. When the
//! replayed history exceeds the budget, whole turns are taken from the front
//! until the remainder fits. The taken prefix is summarized with
//! `summary.txt` and injected as a single system message.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::llm::{ChatMessage, LlmProvider, ModelOutput};
use crate::subsystems::memory::{Turn, replay};

use super::core::prompt::PromptBuilder;

const SUMMARY_TEMPLATE: &str = "summary.txt";
const SUMMARY_FALLBACK: &str = "Summarize the conversation below. Current summary: {{summary}}\n\n\
{{conversation}}\n\nNew summary:";

/// Rough token estimate used for the history budget.
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    chars.div_ceil(4)
}

pub struct HistoryCondenser {
    provider: LlmProvider,
    prompts_dir: PathBuf,
    max_tokens: usize,
}

impl HistoryCondenser {
    pub fn new(provider: LlmProvider, prompts_dir: impl Into<PathBuf>, max_tokens: usize) -> Self {
        Self { provider, prompts_dir: prompts_dir.into(), max_tokens }
    }

    /// Replay `turns` as chat messages, condensed to fit the budget.
    pub async fn condense(&self, turns: &[Turn]) -> Vec<ChatMessage> {
        let split = self.split_point(turns);
        if split == 0 {
            return replay(turns);
        }

        let (dropped, kept) = turns.split_at(split);
        debug!(dropped = dropped.len(), kept = kept.len(), "history over budget, condensing");

        let mut messages = Vec::with_capacity(kept.len() * 2 + 1);
        match self.summarize(dropped).await {
            Some(summary) => messages.push(ChatMessage::system(format!(
                "Summary of the earlier conversation:\n{summary}"
            ))),
            None => warn!(dropped = dropped.len(), "history summary failed, older turns dropped"),
        }
        messages.extend(replay(kept));
        messages
    }

    /// Number of leading turns that must go for the rest to fit.
    fn split_point(&self, turns: &[Turn]) -> usize {
        let costs: Vec<usize> = turns
            .iter()
            .map(|t| estimate_tokens(&replay(std::slice::from_ref(t))))
            .collect();
        let mut total: usize = costs.iter().sum();
        let mut split = 0;
        while total > self.max_tokens && split < costs.len() {
            total -= costs[split];
            split += 1;
        }
        split
    }

    async fn summarize(&self, turns: &[Turn]) -> Option<String> {
        let conversation = turns
            .iter()
            .map(|t| format!("Human: {}\nAI: {}", t.question, t.answer))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = PromptBuilder::new(&self.prompts_dir)
            .layer_or(SUMMARY_TEMPLATE, SUMMARY_FALLBACK)
            .var("summary", "")
            .var("conversation", conversation)
            .build();

        match self.provider.chat(&[ChatMessage::user(prompt)], &[]).await {
            Ok(ModelOutput::Chat(message)) => Some(message.content.trim().to_string()),
            Ok(ModelOutput::Completion(text)) => Some(text.trim().to_string()),
            Err(e) => {
                warn!(error = %e, "summary model call failed");
                None
            }
        }
        .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::llm::providers::scripted::{ScriptedProvider, ScriptedReply};

    fn prompts_dir() -> PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/prompts")
    }

    fn turn(q: &str, a: &str) -> Turn {
        Turn { question: q.into(), answer: a.into(), tools: vec![] }
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(&[]), 0);
        assert_eq!(estimate_tokens(&[ChatMessage::user("abcde")]), 2);
        assert_eq!(estimate_tokens(&[ChatMessage::user("abcd"), ChatMessage::assistant("abcd")]), 2);
    }

    #[tokio::test]
    async fn under_budget_replays_unchanged() {
        let scripted = ScriptedProvider::default();
        let c = HistoryCondenser::new(LlmProvider::Scripted(scripted.clone()), prompts_dir(), 1000);
        let turns = vec![turn("hello there", "hi friend")];
        assert_eq!(c.condense(&turns).await, replay(&turns));
        assert_eq!(scripted.calls(), 0);
    }

    #[tokio::test]
    async fn over_budget_folds_oldest_turns_into_summary() {
        let scripted = ScriptedProvider::new([ScriptedReply::text("They discussed the VPN.")]);
        // Each turn costs 10 tokens (40 chars); budget fits two.
        let c = HistoryCondenser::new(LlmProvider::Scripted(scripted.clone()), prompts_dir(), 20);
        let q = "q".repeat(20);
        let a = "a".repeat(20);
        let turns = vec![turn(&q, &a), turn(&q, &a), turn(&q, &a)];

        let msgs = c.condense(&turns).await;
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("They discussed the VPN."));
        assert!(scripted.prompts()[0][0].content.contains(&format!("Human: {q}")));
    }

    #[tokio::test]
    async fn summary_failure_drops_turns() {
        let scripted = ScriptedProvider::new([ScriptedReply::Fail("down".into())]);
        let c = HistoryCondenser::new(LlmProvider::Scripted(scripted), prompts_dir(), 10);
        let long = "x".repeat(40);
        let turns = vec![turn(&long, &long), turn("q", "a")];
        let msgs = c.condense(&turns).await;
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "q");
    }
}

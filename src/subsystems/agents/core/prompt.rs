//! Prompt templates loaded from `config/prompts/`.
//!
//! ## Files
//!
//! ```text
//! coordinator.md     — coordinator persona
//! knowledge_base.md  — knowledge-base persona
//! summary.txt        — history condensation; {{summary}}, {{conversation}}
//! rag_qa.txt         — retrieval answer; {{question}}, {{context}}
//! ```
//!
//! Every template has a built-in fallback so a missing or empty file never
//! stops a service. Substitution is a single left-to-right pass: text that
//! came in through a variable is never scanned again, so a question that
//! happens to contain `{{context}}` stays literal.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// One template plus its variable bindings.
///
/// ```rust
/// use berry_agents::subsystems::agents::core::prompt::PromptBuilder;
///
/// let prompt = PromptBuilder::new("config/prompts")
///     .layer_or("no_such_file.txt", "Question: {{question}}")
///     .var("question", "What is overfitting?")
///     .build();
/// assert_eq!(prompt, "Question: What is overfitting?");
/// ```
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    template: String,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            template: String::new(),
            vars: HashMap::new(),
        }
    }

    /// Use `filename` from the prompts directory, or `fallback` when the
    /// file is missing or blank.
    pub fn layer_or(mut self, filename: &str, fallback: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        self.template = match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                debug!(path = %path.display(), "prompt file blank, using built-in");
                fallback.to_string()
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "prompt file unreadable, using built-in");
                fallback.to_string()
            }
        };
        self
    }

    /// Bind `{{key}}` to `value`.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Render the template. Unbound placeholders are left as written.
    pub fn build(self) -> String {
        render(&self.template, &self.vars)
    }
}

fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        match after.find(CLOSE) {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key.trim()) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str(OPEN);
                        out.push_str(key);
                        out.push_str(CLOSE);
                    }
                }
                rest = &after[end + CLOSE.len()..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

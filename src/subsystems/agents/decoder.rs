//! Response decoder: turns one [`ModelOutput`] into the agent's next move.

use thiserror::Error;

use crate::llm::{ModelOutput, ToolCallRequest};
use crate::subsystems::tools::{ToolBox, ToolInput, ToolKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// The provider answered in a shape the agent loop cannot act on.
    #[error("unsupported model response shape: {0}")]
    UnsupportedShape(&'static str),
    #[error("model requested unknown tool '{0}'")]
    UnknownTool(String),
    #[error("bad arguments for tool '{tool}': {reason}")]
    BadArguments { tool: String, reason: String },
}

/// One tool call as requested, with its typed input when it decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub id: String,
    pub tool: String,
    pub raw_arguments: String,
    pub input: Result<ToolInput, DecodeError>,
}

impl DecodedCall {
    pub fn request(&self) -> ToolCallRequest {
        ToolCallRequest {
            id: self.id.clone(),
            name: self.tool.clone(),
            arguments: self.raw_arguments.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    /// Final answer text, unfiltered.
    Finish(String),
    /// Run these calls and ask the model again. `content` is any text the
    /// model emitted next to the calls.
    Invoke { content: String, calls: Vec<DecodedCall> },
}

pub fn decode(output: ModelOutput, tools: &ToolBox) -> Result<AgentDecision, DecodeError> {
    let message = match output {
        ModelOutput::Chat(message) => message,
        ModelOutput::Completion(_) => return Err(DecodeError::UnsupportedShape("text completion")),
    };

    if message.tool_calls.is_empty() {
        return Ok(AgentDecision::Finish(message.content));
    }

    let calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            let input = decode_call(&call, tools);
            DecodedCall { id: call.id, tool: call.name, raw_arguments: call.arguments, input }
        })
        .collect();
    Ok(AgentDecision::Invoke { content: message.content, calls })
}

fn decode_call(call: &ToolCallRequest, tools: &ToolBox) -> Result<ToolInput, DecodeError> {
    let kind: ToolKind =
        tools.lookup(&call.name).ok_or_else(|| DecodeError::UnknownTool(call.name.clone()))?;
    kind.parse_input(&call.arguments).map_err(|e| DecodeError::BadArguments {
        tool: call.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::AssistantMessage;
    use crate::subsystems::tools::KnowledgeBaseInput;
    use crate::subsystems::tools::identity::TokenSource;
    use crate::subsystems::tools::remote::RemoteChain;

    fn kb_tools() -> ToolBox {
        ToolBox::new().with(
            ToolKind::KnowledgeBase,
            RemoteChain::new(reqwest::Client::new(), "http://kb/", TokenSource::PassThrough),
        )
    }

    fn chat_with_call(name: &str, args: &str) -> ModelOutput {
        ModelOutput::Chat(AssistantMessage {
            content: String::new(),
            tool_calls: vec![ToolCallRequest {
                id: "call_1".into(),
                name: name.into(),
                arguments: args.into(),
            }],
        })
    }

    #[test]
    fn completion_shape_is_fatal() {
        let err = decode(ModelOutput::Completion("hi".into()), &kb_tools()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedShape(_)));
    }

    #[test]
    fn plain_chat_is_final_answer() {
        let out = ModelOutput::Chat(AssistantMessage::text("All done here."));
        assert_eq!(
            decode(out, &kb_tools()).unwrap(),
            AgentDecision::Finish("All done here.".into())
        );
    }

    #[test]
    fn tool_call_decodes_to_typed_input() {
        let decision = decode(chat_with_call("knowledge_base_tool", r#"{"query":"vpn"}"#), &kb_tools())
            .unwrap();
        let AgentDecision::Invoke { calls, .. } = decision else {
            panic!("expected tool calls");
        };
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].input,
            Ok(ToolInput::KnowledgeBase(KnowledgeBaseInput { query: "vpn".into() }))
        );
        assert_eq!(calls[0].request().arguments, r#"{"query":"vpn"}"#);
    }

    #[test]
    fn unbound_tool_is_per_call_error() {
        let decision =
            decode(chat_with_call("rewrite_answer_tool", r#"{"answer":"x"}"#), &kb_tools()).unwrap();
        let AgentDecision::Invoke { calls, .. } = decision else {
            panic!("expected tool calls");
        };
        let err = calls[0].input.clone().unwrap_err();
        assert_eq!(err, DecodeError::UnknownTool("rewrite_answer_tool".into()));
    }

    #[test]
    fn malformed_arguments_are_per_call_error() {
        let decision =
            decode(chat_with_call("knowledge_base_tool", "{query: vpn"), &kb_tools()).unwrap();
        let AgentDecision::Invoke { calls, .. } = decision else {
            panic!("expected tool calls");
        };
        assert!(matches!(calls[0].input, Err(DecodeError::BadArguments { .. })));
    }
}

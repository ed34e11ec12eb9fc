use serde_json::Value;

use crate::OpaqueMessage;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The conversation so far, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools the model may call in its answer.
    pub tools: Vec<ModelTool>,
}

/// One message of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// Text typed by the user.
    User(String),
    /// Plain assistant text.
    Assistant(String),
    /// The answer to a tool call.
    Tool(ToolCallResult),
    /// An assistant message in the provider's own format.
    Opaque(OpaqueMessage),
}

/// The output of a tool, addressed to the call that requested it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// Identifier of the [`ToolCallRequest`](crate::ToolCallRequest).
    pub id: String,
    /// What the tool produced, usually JSON text.
    pub content: String,
}

/// A tool offered to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name the model uses to call the tool.
    pub name: String,
    /// What the tool does, written for the model.
    pub description: String,
    /// [JSON schema](https://json-schema.org/) of the call arguments.
    pub parameters: Value,
}

use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpaqueMessage;
use crate::provider::ModelProviderError;

/// A streamed answer from a model provider.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Attempts to pull the next event out of the stream.
    ///
    /// - `Poll::Pending`: no event yet; the task is woken when there may be
    ///   one.
    /// - `Poll::Ready(Ok(Some(event)))`: an event, more may follow.
    /// - `Poll::Ready(Ok(None))`: the stream is over. Every later call must
    ///   return this again.
    /// - `Poll::Ready(Err(error))`: the stream failed.
    ///
    /// Events arrive in this order: message deltas, then tool calls, then a
    /// single [`ModelResponseEvent::Completed`].
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;

    /// Returns the whole assistant message in the provider's own format.
    ///
    /// Only meaningful once the stream returned `Ok(None)`. Providers that
    /// have no special history format return `None`, and callers then fall
    /// back to [`ModelMessage::Assistant`](crate::ModelMessage::Assistant).
    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        None
    }
}

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model waits for the results of its tool calls.
    ToolCalls,
    /// The answer is complete.
    Stop,
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier to echo back in the [`ToolCallResult`](crate::ToolCallResult).
    pub id: String,
    /// Name of the tool to call.
    pub name: String,
    /// Decoded JSON arguments, `Value::Null` if the model sent none.
    pub arguments: Value,
}

/// An event of a streamed response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// A chunk of assistant text.
    MessageDelta(String),
    /// A complete tool call.
    ToolCall(ToolCallRequest),
    /// The model finished.
    Completed(ModelFinishReason),
}

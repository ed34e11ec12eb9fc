use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use serde_json::Value;
use thin_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{
    ChatCompletionChunk, FunctionCall, Message, ToolCall, ToolCallDelta,
};

/// Used when the server never sent a completion id.
const FALLBACK_ID: &str = "chatcmpl-unknown";

#[derive(Default)]
struct PartialToolCall {
    index: Option<u32>,
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn merge(&mut self, delta: ToolCallDelta) {
        if let Some(id) = delta.id {
            self.id.push_str(&id);
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                self.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                self.arguments.push_str(&arguments);
            }
        }
    }

    fn to_request(&self) -> ToolCallRequest {
        let arguments = if self.arguments.trim().is_empty() {
            Value::Null
        } else {
            // Left as text so the tool reports the bad input to the model.
            serde_json::from_str(&self.arguments)
                .unwrap_or_else(|_| Value::String(self.arguments.clone()))
        };
        ToolCallRequest {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments,
        }
    }

    fn to_message_part(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            r#type: "function",
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.arguments.clone(),
            },
        }
    }
}

struct PartialState {
    sse: Sse,
    id: Option<String>,
    content: String,
    tool_calls: Vec<PartialToolCall>,
    // Events decoded but not yet handed out, in emission order.
    queue: VecDeque<ModelResponseEvent>,
    completed: bool,
}

impl PartialState {
    fn new(sse: Sse) -> Self {
        Self {
            sse,
            id: None,
            content: String::new(),
            tool_calls: vec![],
            queue: VecDeque::new(),
            completed: false,
        }
    }

    fn apply_tool_call(&mut self, delta: ToolCallDelta) {
        let existing = match (delta.index, delta.id.as_deref()) {
            (Some(index), _) => {
                self.tool_calls.iter_mut().find(|t| t.index == Some(index))
            }
            (None, Some(id)) if !id.is_empty() => {
                self.tool_calls.iter_mut().find(|t| t.id == id)
            }
            (None, _) => self.tool_calls.last_mut(),
        };
        match existing {
            Some(partial) => partial.merge(delta),
            None => {
                let mut partial = PartialToolCall {
                    index: delta.index,
                    ..Default::default()
                };
                partial.merge(delta);
                self.tool_calls.push(partial);
            }
        }
    }

    /// Queues the tool calls and the final event.
    fn complete(&mut self, reason: Option<&str>) -> Result<(), Error> {
        if reason == Some("content_filter") {
            return Err(Error::new(
                "the answer was blocked by the content filter",
                ErrorKind::Moderated,
            ));
        }
        for tool_call in &self.tool_calls {
            self.queue
                .push_back(ModelResponseEvent::ToolCall(tool_call.to_request()));
        }
        // Some compatible servers say "stop" even when they call tools.
        let reason = if self.tool_calls.is_empty() {
            ModelFinishReason::Stop
        } else {
            ModelFinishReason::ToolCalls
        };
        self.queue.push_back(ModelResponseEvent::Completed(reason));
        self.completed = true;
        Ok(())
    }

    fn finish(self) -> (String, Message) {
        let tool_calls: Vec<_> = self
            .tool_calls
            .iter()
            .map(PartialToolCall::to_message_part)
            .collect();
        let content = if self.content.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(self.content)
        };
        (
            self.id.unwrap_or_else(|| FALLBACK_ID.to_owned()),
            Message::Assistant {
                content,
                tool_calls,
            },
        )
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    /// A streamed chat completion.
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let state = PartialState::new(sse);
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), state)) => {
                *this.next_event_fut = Some(Box::pin(next_event(state)));
                Poll::Ready(Ok(Some(event)))
            }
            Ok((None, state)) => {
                *this.next_event_fut = None;
                *this.full_msg = Some(state.finish());
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_event_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(mut state: PartialState) -> NextEvent {
    loop {
        if let Some(event) = state.queue.pop_front() {
            return Ok((Some(event), state));
        }
        if state.completed {
            return Ok((None, state));
        }

        let data = match state.sse.next_event().await {
            Ok(Some(data)) if data != "[DONE]" => data,
            Ok(_) => {
                state.complete(None)?;
                continue;
            }
            Err(SseError::Chunks(err)) => {
                return Err(Error::new(
                    format!("failed to read the stream: {}", err.0),
                    ErrorKind::Other,
                ));
            }
            Err(SseError::InvalidPayload) => {
                return Err(Error::new(
                    "the stream is not valid UTF-8",
                    ErrorKind::Other,
                ));
            }
        };
        trace!("got sse event: {data}");

        let chunk =
            serde_json::from_str::<ChatCompletionChunk>(&data).map_err(|err| {
                Error::new(format!("malformed chunk: {err}"), ErrorKind::Other)
            })?;
        if state.id.is_none() {
            state.id = chunk.id;
        }

        // Usage-only chunks carry no choice.
        for choice in chunk.choices {
            match choice.delta.content {
                Some(content) if !content.is_empty() => {
                    state.content.push_str(&content);
                    state
                        .queue
                        .push_back(ModelResponseEvent::MessageDelta(content));
                }
                _ => {}
            }
            for delta in choice.delta.tool_calls.unwrap_or_default() {
                state.apply_tool_call(delta);
            }
            if let Some(reason) = choice.finish_reason {
                state.complete(Some(&reason))?;
                break;
            }
        }
    }
}

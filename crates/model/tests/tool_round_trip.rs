use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll};

use serde_json::json;
use thin_agent_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ModelTool, ToolCallRequest, ToolCallResult,
};

#[derive(Debug)]
struct FakeError(ErrorKind);

impl Display for FakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fake provider failed: {}", self.0)
    }
}

impl Error for FakeError {}

impl ModelProviderError for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

struct FakeResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl ModelResponse for FakeResponse {
    type Error = FakeError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }
}

/// Asks for a URL to be fetched, then reports whatever the tool returned.
struct FetchingModel;

impl ModelProvider for FetchingModel {
    type Error = FakeError;
    type Response = FakeResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let events = match req.messages.last() {
            Some(ModelMessage::User(text)) if !req.tools.is_empty() => vec![
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call-0".to_owned(),
                    name: req.tools[0].name.clone(),
                    arguments: json!({ "url": text }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ],
            Some(ModelMessage::Tool(result)) => vec![
                ModelResponseEvent::MessageDelta("The API said: ".to_owned()),
                ModelResponseEvent::MessageDelta(result.content.clone()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ],
            _ => return ready(Err(FakeError(ErrorKind::Other))),
        };
        ready(Ok(FakeResponse {
            events: events.into(),
        }))
    }
}

async fn drain(
    mut resp: FakeResponse,
) -> (String, Vec<ToolCallRequest>, Option<ModelFinishReason>) {
    let mut text = String::new();
    let mut calls = vec![];
    let mut finish = None;
    while let Some(event) =
        poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx))
            .await
            .unwrap()
    {
        match event {
            ModelResponseEvent::MessageDelta(delta) => text.push_str(&delta),
            ModelResponseEvent::ToolCall(call) => calls.push(call),
            ModelResponseEvent::Completed(reason) => finish = Some(reason),
        }
    }
    (text, calls, finish)
}

#[tokio::test]
async fn test_tool_call_then_answer() {
    let mut req = ModelRequest {
        messages: vec![
            ModelMessage::System("You fetch URLs.".to_owned()),
            ModelMessage::User("https://example.com".to_owned()),
        ],
        tools: vec![ModelTool {
            name: "make_request".to_owned(),
            description: "GET a URL".to_owned(),
            parameters: json!({ "type": "object" }),
        }],
    };

    let resp = FetchingModel.send_request(&req).await.unwrap();
    let (text, calls, finish) = drain(resp).await;
    assert!(text.is_empty());
    assert_eq!(finish, Some(ModelFinishReason::ToolCalls));
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "make_request");
    assert_eq!(calls[0].arguments, json!({ "url": "https://example.com" }));

    req.messages.push(ModelMessage::Tool(ToolCallResult {
        id: calls[0].id.clone(),
        content: r#"{"success":true}"#.to_owned(),
    }));
    let resp = FetchingModel.send_request(&req).await.unwrap();
    let (text, calls, finish) = drain(resp).await;
    assert_eq!(text, r#"The API said: {"success":true}"#);
    assert!(calls.is_empty());
    assert_eq!(finish, Some(ModelFinishReason::Stop));
}

#[tokio::test]
async fn test_error_kind() {
    let err = FetchingModel
        .send_request(&ModelRequest::default())
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(!err.kind().is_retryable());
}

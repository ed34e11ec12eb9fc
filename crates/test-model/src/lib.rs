//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use thin_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    turn: usize,
    preset: PresetResponse,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn event_at(&self, idx: usize) -> Option<ModelResponseEvent> {
        let events = &self.preset.events;
        if idx < events.len() {
            Some(match &events[idx] {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                PresetEvent::ToolCall(req) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
            })
        } else if idx == events.len() {
            Some(ModelResponseEvent::Completed(if self.preset.has_tool_call() {
                ModelFinishReason::ToolCalls
            } else {
                ModelFinishReason::Stop
            }))
        } else {
            None
        }
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if this.event_idx > this.preset.events.len() {
            // Called again after completion.
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let timer = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(timer.as_mut().poll(cx));
        this.sleep = None;

        let event = this.event_at(this.event_idx);
        this.event_idx += 1;
        Poll::Ready(Ok(event))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        Some(OpaqueMessage::new(
            format!("msg:{}", self.turn),
            self.preset.clone(),
        ))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    // Failed attempts at the response in front of the queue.
    attempts: u64,
    served: usize,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Every request consumes the next scripted assistant turn, whatever the
/// history it carries. Turns with [`PresetResponse::with_failures`] are
/// rejected before they are served. Once the script runs out, requests fail.
///
/// Clones share the script, so a test can keep one to inspect the requests
/// the model received.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Appends an assistant turn to the script.
    #[inline]
    pub fn add_assistant_response_step(&self, preset: PresetResponse) {
        self.script().responses.push_back(preset);
    }

    /// Sets the pause before each streamed event.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, failed attempts included.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script().requests.clone()
    }

    /// Returns how many scripted turns are still waiting to be served.
    pub fn remaining_steps(&self) -> usize {
        self.script().responses.len()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let mut script = self.script();
        script.requests.push(req.clone());

        let Some(front) = script.responses.front() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };
        let failure_kind =
            front.failure_kind.unwrap_or(ErrorKind::RateLimitExceeded);
        let failing = match front.failures {
            Some(0) => true,
            Some(n) => script.attempts < n,
            None => false,
        };
        if failing {
            script.attempts += 1;
            return Err(Error {
                message: "injected failure",
                kind: failure_kind,
            });
        }

        script.attempts = 0;
        let turn = script.served;
        script.served += 1;
        let preset = script.responses.pop_front().unwrap_or_else(|| {
            PresetResponse::with_events(Vec::<PresetEvent>::new())
        });
        Ok(TestModelResponse {
            turn,
            preset,
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.next_response(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use serde_json::json;
    use thin_agent_model::{ModelMessage, ModelTool, ToolCallRequest};

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>, OpaqueMessage) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(_) => break,
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
        assert!(
            poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .is_none()
        );
        (msg, tool_call, resp.make_opaque_message().unwrap())
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestModelProvider::default();
        provider.add_assistant_response_step(PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me ".to_owned()),
            PresetEvent::MessageDelta("look.".to_owned()),
            PresetEvent::tool_call(
                "tool:1",
                "make_request",
                json!({ "url": "https://api.github.com" }),
            ),
        ]));
        provider.add_assistant_response_step(PresetResponse::with_text(
            "GitHub answered.",
        ));

        let mut req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![ModelTool {
                name: "make_request".to_owned(),
                description: "GET a URL".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, opaque_msg) = collect_response(resp).await;
        assert_eq!(msg, "Let me look.");
        assert_eq!(opaque_msg.id(), "msg:0");
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "make_request");
        assert_eq!(tool_call.arguments, json!({ "url": "https://api.github.com" }));

        req.messages.push(ModelMessage::Opaque(opaque_msg));
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call, _) = collect_response(resp).await;
        assert_eq!(msg, "GitHub answered.");
        assert!(tool_call.is_none());

        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.requests()[1].messages.len(), 2);
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_failures() {
        let provider = TestModelProvider::default();
        provider
            .add_assistant_response_step(PresetResponse::with_text("ok").with_failures(2));
        let req = ModelRequest::default();

        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(collect_response(resp).await.0, "ok");
        assert_eq!(provider.remaining_steps(), 0);
    }

    #[tokio::test]
    async fn test_always_failing() {
        let provider = TestModelProvider::default();
        provider.add_assistant_response_step(
            PresetResponse::with_text("never")
                .with_failures(0)
                .with_failure_kind(ErrorKind::Moderated),
        );
        for _ in 0..5 {
            let err = provider
                .send_request(&ModelRequest::default())
                .await
                .err()
                .unwrap();
            assert_eq!(err.kind(), ErrorKind::Moderated);
        }
        assert_eq!(provider.remaining_steps(), 1);
    }
}

use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::future::retry_notify;
use thin_agent_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage, ToolCallRequest,
};
use tracing::Instrument;

pub(crate) type BoxedModelError = Box<dyn ModelProviderError>;
type SendRequestResult = Result<ModelClientResponse, BoxedModelError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
pub(crate) type OnTranscript = Arc<dyn Fn(String) + Send + Sync>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, OnTranscript) -> BoxedSendRequestFuture + Send + Sync
>;

/// How rate-limited model requests are sent again.
///
/// Waits grow exponentially from `initial_interval` up to `max_interval`;
/// once `max_elapsed_time` has passed since the first attempt the last error
/// is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first retry.
    pub initial_interval: Duration,
    /// Upper bound of a single wait.
    pub max_interval: Duration,
    /// Upper bound of the whole exchange, retries included.
    pub max_elapsed_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(16),
            max_elapsed_time: Duration::from_secs(60),
        }
    }
}

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let handler_fn: HandlerFn = Arc::new(move |req, on_transcript| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("sending {} messages", req.messages.len());
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_transcript).await
                }
                .instrument(debug_span!("model request")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and collects the whole response.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_transcript: OnTranscript,
    ) -> SendRequestResult {
        (self.handler_fn)(req, on_transcript).await
    }

    /// Like [`ModelClient::send_request`], sending the request again while
    /// the provider reports a retryable error.
    pub async fn send_request_with_retry(
        &self,
        req: &ModelRequest,
        policy: Option<RetryPolicy>,
        on_transcript: OnTranscript,
    ) -> SendRequestResult {
        let Some(policy) = policy else {
            return self.send_request(req.clone(), on_transcript).await;
        };

        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(policy.initial_interval)
            .with_max_interval(policy.max_interval)
            .with_max_elapsed_time(Some(policy.max_elapsed_time))
            .build();
        retry_notify(
            backoff,
            || {
                let fut =
                    self.send_request(req.clone(), Arc::clone(&on_transcript));
                async move {
                    fut.await.map_err(|err| {
                        if err.kind().is_retryable() {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: BoxedModelError, wait: Duration| {
                warn!("model request failed ({err}), retrying in {wait:?}");
            },
        )
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub(crate) struct ModelClientResponse {
    pub transcript: String,
    pub opaque_msg: Option<OpaqueMessage>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: OnTranscript,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            debug!("request rejected: {err}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                debug!("stream failed: {err}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
                on_transcript(msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!(
        "response finished ({finish_reason:?}) with {} tool calls",
        tool_calls.len()
    );

    Ok(ModelClientResponse {
        transcript,
        opaque_msg,
        tool_calls,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use thin_agent_model::{ErrorKind, ModelMessage};
    use thin_agent_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            tools: vec![],
        }
    }

    fn quick_policy() -> Option<RetryPolicy> {
        Some(RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed_time: Duration::from_millis(500),
        })
    }

    #[tokio::test]
    async fn test_send_request() {
        let model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([
                PresetEvent::MessageDelta("How ".to_owned()),
                PresetEvent::MessageDelta("are ".to_owned()),
                PresetEvent::MessageDelta("you?".to_owned()),
            ]),
        );

        let model_client = ModelClient::new(model_provider);
        let deltas = Arc::new(AtomicUsize::new(0));
        let resp = model_client
            .send_request(request(), {
                let deltas = Arc::clone(&deltas);
                Arc::new(move |_| {
                    deltas.fetch_add(1, Ordering::Relaxed);
                })
            })
            .await
            .unwrap();
        assert_eq!(resp.transcript, "How are you?");
        assert!(resp.opaque_msg.is_some());
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
        assert_eq!(deltas.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_client = ModelClient::new(TestModelProvider::default());
        let resp_or_err =
            model_client.send_request(request(), Arc::new(|_| {})).await;
        assert!(resp_or_err.is_err());
    }

    #[tokio::test]
    async fn test_retry_rate_limited() {
        let model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_text("finally").with_failures(2),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let resp = model_client
            .send_request_with_retry(&request(), quick_policy(), Arc::new(|_| {}))
            .await
            .unwrap();
        assert_eq!(resp.transcript, "finally");
        assert_eq!(model_provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_for_other_errors() {
        let model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_text("never")
                .with_failures(1)
                .with_failure_kind(ErrorKind::Moderated),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let err = model_client
            .send_request_with_retry(&request(), quick_policy(), Arc::new(|_| {}))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Moderated);
        assert_eq!(model_provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let model_provider = TestModelProvider::default();
        model_provider.add_assistant_response_step(
            PresetResponse::with_text("never").with_failures(0),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let policy = Some(RetryPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(2),
            max_elapsed_time: Duration::from_millis(20),
        });
        let err = model_client
            .send_request_with_retry(&request(), policy, Arc::new(|_| {}))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert!(model_provider.requests().len() > 1);
    }
}

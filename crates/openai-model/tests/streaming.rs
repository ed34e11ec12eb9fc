use std::future::poll_fn;
use std::pin::pin;

use serde_json::json;
use thin_agent_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ModelTool,
};
use thin_agent_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM: &str = concat!(
    "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,",
    "\"id\":\"call_1\",\"type\":\"function\",\"function\":{\"name\":\"make_request\",",
    "\"arguments\":\"{\\\"url\\\":\\\"https://api.github.com\\\"}\"}}]}}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
    "data: [DONE]\n\n",
);

fn provider(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new(
        OpenAIConfigBuilder::with_api_key("test-key")
            .with_model("test-model")
            .with_base_url(server.uri())
            .build(),
    )
}

fn request() -> ModelRequest {
    ModelRequest {
        messages: vec![
            ModelMessage::System("You call REST APIs.".to_owned()),
            ModelMessage::User("What does GitHub's API root say?".to_owned()),
        ],
        tools: vec![ModelTool {
            name: "make_request".to_owned(),
            description: "GET a URL".to_owned(),
            parameters: json!({ "type": "object" }),
        }],
    }
}

#[tokio::test]
async fn test_streamed_tool_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(STREAM, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let resp = provider(&server).send_request(&request()).await.unwrap();
    let mut resp = pin!(resp);
    let mut events = vec![];
    while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
        .await
        .unwrap()
    {
        events.push(event);
    }

    assert_eq!(events.len(), 2);
    let ModelResponseEvent::ToolCall(call) = &events[0] else {
        panic!("expected a tool call, got {:?}", events[0]);
    };
    assert_eq!(call.id, "call_1");
    assert_eq!(call.arguments, json!({ "url": "https://api.github.com" }));
    assert_eq!(
        events[1],
        ModelResponseEvent::Completed(ModelFinishReason::ToolCalls)
    );
    assert_eq!(resp.make_opaque_message().unwrap().id(), "c1");
}

#[tokio::test]
async fn test_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("quota exhausted"),
        )
        .mount(&server)
        .await;

    let err = provider(&server)
        .send_request(&request())
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    assert!(err.message().contains("quota exhausted"));
}

#[tokio::test]
async fn test_rejects_non_stream_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "c1" })),
        )
        .mount(&server)
        .await;

    let err = provider(&server)
        .send_request(&request())
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(err.message().starts_with("unexpected content type"));
}

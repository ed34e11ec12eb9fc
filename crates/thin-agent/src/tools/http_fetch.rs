use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Client;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use thin_agent_core::tool::{Tool, ToolResult};
use tracing::Instrument;

use crate::envelope::Envelope;

/// Arguments of `make_request`.
#[derive(Deserialize, JsonSchema)]
pub struct HttpFetchParameters {
    #[schemars(description = "Absolute http(s) URL to fetch with GET.")]
    url: String,
}

/// A tool for fetching a URL with a plain GET request.
///
/// Every outcome, including transport failures, is answered with an
/// [`Envelope`].
pub struct HttpFetchTool {
    client: Client,
    parameter_schema: Value,
}

impl HttpFetchTool {
    /// Creates a new fetch tool whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_client(timeout)?))
    }

    /// Creates a new fetch tool on top of an existing client.
    #[inline]
    pub fn with_client(client: Client) -> Self {
        HttpFetchTool {
            client,
            parameter_schema: schema_for!(HttpFetchParameters).to_value(),
        }
    }
}

impl Tool for HttpFetchTool {
    type Input = HttpFetchParameters;

    fn name(&self) -> &str {
        "make_request"
    }

    fn description(&self) -> &str {
        r#"
Makes a GET request to the given URL and returns the response.
JSON bodies are returned decoded, anything else as text. Failures are reported in the `error` field together with the HTTP status code when the server answered."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: HttpFetchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        async move { Ok(fetch(&client, &input.url).await.to_tool_output()) }
    }
}

/// Creates the client used by [`HttpFetchTool::new`].
///
/// Some APIs (GitHub's among them) refuse requests without a user agent,
/// so the client identifies itself like any HTTP library would.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Fetches `url` with GET and wraps the outcome into an envelope.
pub async fn fetch(client: &Client, url: &str) -> Envelope {
    let span = debug_span!("http fetch", url);
    async {
        let resp = match client.get(url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!("request failed: {err}");
                return Envelope::failure(format!(
                    "Request failed: {}",
                    error_chain(&err)
                ));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            debug!("server answered {status}");
            return Envelope::http_rejected(status.as_u16());
        }

        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(err) => {
                warn!("cannot read body: {err}");
                return Envelope::failure(format!(
                    "Request failed: {}",
                    error_chain(&err)
                ));
            }
        };
        let data = serde_json::from_slice(&body).unwrap_or_else(|_| {
            trace!("body is not JSON, returning text");
            Value::String(String::from_utf8_lossy(&body).into_owned())
        });
        Envelope::http_ok(status.as_u16(), data)
    }
    .instrument(span)
    .await
}

/// Joins an error with its sources, the outermost message of a transport
/// error rarely says what happened.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

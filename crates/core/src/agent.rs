mod builder;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use thin_agent_model::{ModelMessage, ModelTool};
use tracing::Instrument;

use crate::conversation::Conversation;
use crate::model_client::{
    BoxedModelError, ModelClient, ModelClientResponse, OnTranscript,
};
use crate::tool::manager::Manager as ToolManager;
pub use builder::AgentBuilder;

/// Model round trips allowed in a single run, unless configured otherwise.
pub const DEFAULT_MAX_STEPS: usize = 8;

/// Progress of a run, for front ends that show it live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    /// A chunk of the assistant's text.
    MessageDelta(String),
    /// The model asked for a tool and it is about to run.
    ToolCall {
        /// Name of the tool.
        name: String,
    },
}

/// Why a run failed.
#[derive(Debug)]
pub enum AgentError {
    /// The model provider failed, after retries if the error was retryable.
    Model(BoxedModelError),
    /// The model kept calling tools past the step limit.
    TooManySteps(usize),
}

impl Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Model(err) => {
                write!(f, "model request failed ({}): {err}", err.kind())
            }
            AgentError::TooManySteps(steps) => {
                write!(f, "no final answer after {steps} model requests")
            }
        }
    }
}

impl StdError for AgentError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AgentError::Model(err) => {
                let err: &(dyn StdError + 'static) = &**err;
                Some(err)
            }
            AgentError::TooManySteps(_) => None,
        }
    }
}

/// An agent: a model provider, an instruction and a toolset.
///
/// Agents hold no conversation state, a single instance can serve any
/// number of concurrent runs.
pub struct Agent {
    name: String,
    description: String,
    instruction: String,
    model_client: ModelClient,
    tools: ToolManager,
    max_steps: usize,
    retry_policy: Option<crate::RetryPolicy>,
}

impl Agent {
    /// Returns the name of the agent.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description of the agent.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the instruction sent as the system message.
    #[inline]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Returns the definitions of the registered tools, sorted by name.
    #[inline]
    pub fn tool_definitions(&self) -> Vec<ModelTool> {
        self.tools.definitions()
    }

    /// Answers a single message, without any earlier history.
    pub async fn run(&self, input: &str) -> Result<String, AgentError> {
        let mut conversation = Conversation::new();
        self.run_in(&mut conversation, input).await
    }

    /// Answers a message as the next turn of `conversation`.
    pub async fn run_in(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<String, AgentError> {
        self.run_observed(conversation, input, |_| {}).await
    }

    /// Like [`Agent::run_in`], reporting progress to `on_event`.
    pub async fn run_observed(
        &self,
        conversation: &mut Conversation,
        input: &str,
        on_event: impl Fn(AgentEvent) + Send + Sync + 'static,
    ) -> Result<String, AgentError> {
        let on_event = Arc::new(on_event);
        let checkpoint = conversation.len();
        let span = info_span!("agent run", agent = %self.name);
        let result = self
            .run_steps(conversation, input, on_event)
            .instrument(span)
            .await;
        if result.is_err() {
            conversation.truncate(checkpoint);
        }
        result
    }

    async fn run_steps(
        &self,
        conversation: &mut Conversation,
        input: &str,
        on_event: Arc<impl Fn(AgentEvent) + Send + Sync + 'static>,
    ) -> Result<String, AgentError> {
        if conversation.is_empty() && !self.instruction.is_empty() {
            conversation.push(
                ModelMessage::System(self.instruction.clone()),
                self.instruction.clone(),
            );
        }
        conversation.push(ModelMessage::User(input.to_owned()), input.to_owned());

        let on_transcript: OnTranscript = {
            let on_event = Arc::clone(&on_event);
            Arc::new(move |delta| on_event(AgentEvent::MessageDelta(delta)))
        };
        let tools = self.tools.definitions();

        for step in 1..=self.max_steps {
            debug!("model request {step}/{}", self.max_steps);
            let request = conversation.to_request(tools.clone());
            let resp = self
                .model_client
                .send_request_with_retry(
                    &request,
                    self.retry_policy,
                    Arc::clone(&on_transcript),
                )
                .await
                .map_err(AgentError::Model)?;

            let ModelClientResponse {
                transcript,
                opaque_msg,
                tool_calls,
                finish_reason,
            } = resp;
            let msg = match opaque_msg {
                Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
                // Downgrade to a text-only message.
                None => ModelMessage::Assistant(transcript.clone()),
            };
            conversation.push(msg, transcript.clone());

            if tool_calls.is_empty() {
                trace!("final answer ({finish_reason:?})");
                return Ok(transcript);
            }
            for call in tool_calls {
                on_event(AgentEvent::ToolCall {
                    name: call.name.clone(),
                });
                let result = self.tools.call(call).await;
                let transcript = result.content.clone();
                conversation.push(ModelMessage::Tool(result), transcript);
            }
        }

        warn!("giving up after {} model requests", self.max_steps);
        Err(AgentError::TooManySteps(self.max_steps))
    }
}

impl Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tools", &self.tools.definitions().len())
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

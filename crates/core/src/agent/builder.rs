use thin_agent_model::ModelProvider;

use super::{Agent, DEFAULT_MAX_STEPS};
use crate::RetryPolicy;
use crate::model_client::ModelClient;
use crate::tool::Tool;
use crate::tool::manager::Manager as ToolManager;

/// [`Agent`] builder.
pub struct AgentBuilder {
    name: String,
    description: String,
    instruction: String,
    model_client: ModelClient,
    tools: ToolManager,
    max_steps: usize,
    retry_policy: Option<RetryPolicy>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            name: "agent".to_owned(),
            description: String::new(),
            instruction: String::new(),
            model_client: ModelClient::new(provider),
            tools: ToolManager::default(),
            max_steps: DEFAULT_MAX_STEPS,
            retry_policy: Some(RetryPolicy::default()),
        }
    }

    /// Sets the name, used in logs.
    #[inline]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the one-line description of what the agent does.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the instruction, sent as the system message of every
    /// conversation.
    #[inline]
    pub fn with_instruction<S: Into<String>>(mut self, instruction: S) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.add_tool(tool);
        self
    }

    /// Bounds the model round trips of a run. Zero is treated as one.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Replaces the retry policy for rate-limited requests.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Surfaces rate-limit errors immediately.
    #[inline]
    pub fn without_retry(mut self) -> Self {
        self.retry_policy = None;
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        if self.tools.is_empty() {
            debug!("agent {} has no tools", self.name);
        }
        Agent {
            name: self.name,
            description: self.description,
            instruction: self.instruction,
            model_client: self.model_client,
            tools: self.tools,
            max_steps: self.max_steps,
            retry_policy: self.retry_policy,
        }
    }
}

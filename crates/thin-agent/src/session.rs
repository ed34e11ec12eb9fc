use std::sync::Arc;

use thin_agent_core::conversation::{Conversation, Item};
use thin_agent_core::{Agent, AgentError, AgentEvent};

/// A chat session, like a window that displays messages and has an input
/// box.
///
/// The session pairs an agent with the history of one conversation, so
/// each message is answered knowing what was said before. The agent itself
/// may be shared by many sessions.
pub struct Session {
    agent: Arc<Agent>,
    conversation: Conversation,
}

impl Session {
    /// Starts an empty session with `agent`.
    #[inline]
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            conversation: Conversation::new(),
        }
    }

    /// Returns the agent answering in this session.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Sends a message and waits for the final answer.
    ///
    /// A failed turn is not kept in the history.
    #[inline]
    pub async fn send_message(&mut self, message: &str) -> Result<String, AgentError> {
        self.agent.run_in(&mut self.conversation, message).await
    }

    /// Like [`Session::send_message`], reporting progress to `on_event`.
    #[inline]
    pub async fn send_message_observed(
        &mut self,
        message: &str,
        on_event: impl Fn(AgentEvent) + Send + Sync + 'static,
    ) -> Result<String, AgentError> {
        self.agent
            .run_observed(&mut self.conversation, message, on_event)
            .await
    }

    /// Forgets everything said so far.
    #[inline]
    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    /// Returns the history, oldest first.
    #[inline]
    pub fn history(&self) -> &[Item] {
        self.conversation.items()
    }
}

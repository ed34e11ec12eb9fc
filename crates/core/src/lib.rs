//! Core logic: the tool abstraction, the model client and the agent loop.
//!
//! An [`Agent`] pairs a model provider with an instruction and a toolset.
//! Running it sends the conversation to the model, executes whatever tools
//! the model asks for, feeds the results back and repeats until the model
//! answers in plain text.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentError, AgentEvent, DEFAULT_MAX_STEPS,
};
pub use model_client::RetryPolicy;

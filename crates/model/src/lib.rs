//! The protocol spoken between an agent and a hosted language model.
//!
//! An agent in this workspace never talks to a model API directly. It builds
//! a [`ModelRequest`] (conversation messages plus the tools it offers), hands
//! it to a [`ModelProvider`] and then drains the streamed
//! [`ModelResponseEvent`]s: text deltas, tool call requests and a final
//! finish reason.
//!
//! Nothing in here performs I/O. Providers (the OpenAI-compatible one, the
//! scripted test one) live in their own crates and only need to honor the
//! contracts documented on these types.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;

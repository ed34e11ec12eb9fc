//! Thin agents that answer questions with a single HTTP request or a SQL
//! statement.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the agents into your own host apps, the
//! webhook relay does exactly that.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod agents;
pub mod config;
pub mod envelope;
mod session;
pub mod sql;
pub mod tools;

pub use envelope::Envelope;
pub use session::Session;

/// Re-exports of [`thin_agent_core`] crate.
pub mod core {
    pub use thin_agent_core::*;
}

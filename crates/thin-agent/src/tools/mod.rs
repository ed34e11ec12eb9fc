//! The tools the agents are registered with.

mod http_fetch;
mod sql_query;

pub use http_fetch::{HttpFetchTool, build_client, fetch};
pub use sql_query::{READ_ONLY_REFUSAL, SqlQueryTool, run_query};

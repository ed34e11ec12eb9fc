//! The registered agents.

use thin_agent_core::{Agent, AgentBuilder};
use thin_agent_model::ModelProvider;

use crate::sql::SqlDialect;
use crate::tools::{HttpFetchTool, SqlQueryTool};

/// Name of the HTTP agent.
pub const REST_AGENT_NAME: &str = "rest_agent";

/// Name of the database agent.
pub const SQL_AGENT_NAME: &str = "sql_agent";

const REST_INSTRUCTION: &str = include_str!("../prompts/rest_agent.md");
const SQL_INSTRUCTION: &str = include_str!("../prompts/sql_agent.md");

/// Returns the instruction of the SQL agent for a database of `dialect`.
pub fn sql_instruction(dialect: SqlDialect) -> String {
    SQL_INSTRUCTION.replace("{{SQL_DIALECT}}", dialect.name())
}

/// Creates the agent that fetches URLs.
pub fn rest_agent<P: ModelProvider + 'static>(
    provider: P,
    tool: HttpFetchTool,
) -> Agent {
    AgentBuilder::with_model_provider(provider)
        .with_name(REST_AGENT_NAME)
        .with_description(
            "A simple agent that makes HTTP requests and returns the response data",
        )
        .with_instruction(REST_INSTRUCTION)
        .with_tool(tool)
        .build()
}

/// Creates the agent that answers questions from the database.
///
/// The instruction names the dialect of the tool's pool so the model
/// writes SQL the backend understands.
pub fn sql_agent<P: ModelProvider + 'static>(
    provider: P,
    tool: SqlQueryTool,
) -> Agent {
    let instruction = sql_instruction(tool.pool().dialect());
    AgentBuilder::with_model_provider(provider)
        .with_name(SQL_AGENT_NAME)
        .with_description(
            "An agent that understands questions in natural language and answers them by running SQL on the store database",
        )
        .with_instruction(instruction)
        .with_tool(tool)
        .build()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use thin_agent_test_model::TestModelProvider;

    use super::*;
    use crate::sql::SqlPool;

    #[test]
    fn test_sql_instruction_names_dialect() {
        let instruction = sql_instruction(SqlDialect::Sqlite);
        assert!(instruction.contains("against a SQLite database"));
        assert!(!instruction.contains("{{SQL_DIALECT}}"));
        assert!(instruction.contains("`execute_sql_query`"));
    }

    #[test]
    fn test_rest_agent_registration() {
        let tool = HttpFetchTool::new(Duration::from_secs(5)).unwrap();
        let agent = rest_agent(TestModelProvider::default(), tool);
        assert_eq!(agent.name(), "rest_agent");
        assert!(agent.instruction().contains("`make_request`"));
        let tools = agent.tool_definitions();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "make_request");
    }

    #[tokio::test]
    async fn test_sql_agent_registration() {
        let pool = SqlPool::connect_url("sqlite::memory:", 1, Duration::from_secs(5))
            .await
            .unwrap();
        let agent = sql_agent(TestModelProvider::default(), SqlQueryTool::new(pool));
        assert_eq!(agent.name(), "sql_agent");
        assert!(agent.instruction().contains("SQLite"));
        let tools = agent.tool_definitions();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "execute_sql_query");
    }
}

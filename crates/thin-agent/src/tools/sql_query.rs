use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use thin_agent_core::tool::{Tool, ToolResult};
use tracing::Instrument;

use crate::envelope::Envelope;
use crate::sql::{SqlOutcome, SqlPool, StatementKind, classify};

/// Answer given to statements refused by the read-only policy.
pub const READ_ONLY_REFUSAL: &str =
    "Only statements that return rows (SELECT, WITH, ...) are allowed.";

/// Arguments of `execute_sql_query`.
#[derive(Deserialize, JsonSchema)]
pub struct SqlQueryParameters {
    #[schemars(description = "The SQL statement to execute, as plain text.")]
    query: String,
}

/// A tool for running SQL statements against the configured database.
pub struct SqlQueryTool {
    pool: SqlPool,
    read_only: bool,
    parameter_schema: Value,
}

impl SqlQueryTool {
    /// Creates a new SQL tool over `pool`, accepting any statement.
    #[inline]
    pub fn new(pool: SqlPool) -> Self {
        SqlQueryTool {
            pool,
            read_only: false,
            parameter_schema: schema_for!(SqlQueryParameters).to_value(),
        }
    }

    /// Refuses statements that do not return rows.
    #[inline]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns the pool the tool runs statements on.
    #[inline]
    pub fn pool(&self) -> &SqlPool {
        &self.pool
    }
}

impl Tool for SqlQueryTool {
    type Input = SqlQueryParameters;

    fn name(&self) -> &str {
        "execute_sql_query"
    }

    fn description(&self) -> &str {
        r#"
Executes a SQL statement and returns the result.
Queries return `row_count` and the rows in `data`, one object per row keyed by column name. Other statements return the number of affected rows in `row_count`. Errors from the database are returned in `error`."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SqlQueryParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let pool = self.pool.clone();
        let read_only = self.read_only;
        async move {
            Ok(run_query(&pool, &input.query, read_only)
                .await
                .to_tool_output())
        }
    }
}

/// Runs `sql` in its own transaction and wraps the outcome into an envelope.
///
/// Database errors roll the transaction back and are reported with the
/// driver's message. With `read_only`, statements that do not start like a
/// query are refused up front, and the backend rejects any write hidden
/// behind one.
pub async fn run_query(pool: &SqlPool, sql: &str, read_only: bool) -> Envelope {
    let sql = sql.trim();
    if sql.is_empty() {
        return Envelope::failure("The query is empty.");
    }

    let kind = classify(sql);
    if read_only && kind == StatementKind::Command {
        info!("refused a statement in read-only mode");
        return Envelope::failure(READ_ONLY_REFUSAL);
    }

    let span = info_span!("sql query", dialect = pool.dialect().name(), ?kind);
    async {
        debug!("executing: {sql}");
        match pool.execute(sql, read_only).await {
            Ok(SqlOutcome::Rows(records)) => {
                debug!("{} rows", records.len());
                Envelope::rows(records)
            }
            Ok(SqlOutcome::Affected(affected)) => {
                debug!("{affected} rows affected");
                Envelope::affected(affected)
            }
            Err(err) => {
                warn!("statement failed: {err}");
                Envelope::failure(err.to_string())
            }
        }
    }
    .instrument(span)
    .await
}

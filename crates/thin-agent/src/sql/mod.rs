//! Statement execution against PostgreSQL or SQLite.
//!
//! Statements arrive as free text and are run with the simple query
//! protocol inside a transaction of their own. Result rows are rendered to
//! JSON objects keyed by column name.

mod postgres;
mod sqlite;

use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

/// A row rendered to JSON, columns in select order.
pub type Record = Map<String, Value>;

/// SQL flavor of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlDialect {
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

impl SqlDialect {
    /// Returns the human-readable name of the dialect.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            SqlDialect::Postgres => "PostgreSQL",
            SqlDialect::Sqlite => "SQLite",
        }
    }
}

/// What a statement looks like from its first keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    /// A query such as `SELECT` or `WITH`.
    Rows,
    /// Anything else.
    Command,
}

/// What a successful statement produced.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlOutcome {
    /// The returned rows.
    Rows(Vec<Record>),
    /// Rows affected by a command.
    Affected(u64),
}

impl SqlOutcome {
    /// Rows win when the driver returned any. A query answering nothing is
    /// still an empty row set, everything else reports the affected count.
    fn from_results(sql: &str, records: Vec<Record>, affected: u64) -> Self {
        if !records.is_empty() || classify(sql) == StatementKind::Rows {
            SqlOutcome::Rows(records)
        } else {
            SqlOutcome::Affected(affected)
        }
    }
}

const ROW_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "SHOW", "EXPLAIN", "PRAGMA", "TABLE",
    "DESCRIBE",
];

/// Tells queries from commands by their first keyword.
///
/// Leading comments, whitespace and parentheses are skipped. This only looks
/// at how the text starts: `WITH ... DELETE` or a second statement after a
/// query still count as queries.
pub fn classify(sql: &str) -> StatementKind {
    let keyword: String = skip_leading_noise(sql)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if ROW_KEYWORDS
        .iter()
        .any(|candidate| keyword.eq_ignore_ascii_case(candidate))
    {
        StatementKind::Rows
    } else {
        StatementKind::Command
    }
}

fn skip_leading_noise(mut sql: &str) -> &str {
    loop {
        let trimmed = sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(rest) = trimmed.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, rest)| rest);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, rest)| rest);
        } else {
            return trimmed;
        }
    }
}

/// A connection pool for one of the supported backends.
#[derive(Clone, Debug)]
pub enum SqlPool {
    /// A PostgreSQL pool.
    Postgres(PgPool),
    /// A SQLite pool.
    Sqlite(SqlitePool),
}

impl SqlPool {
    /// Connects as `config` describes.
    ///
    /// `DATABASE_URL` wins when set. Otherwise a PostgreSQL connection is
    /// built from the host parameters.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        if let Some(url) = &config.url {
            return Self::connect_url(
                url,
                config.max_connections,
                config.acquire_timeout,
            )
            .await;
        }

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user);
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        info!(
            "connecting to postgres at {}:{}/{}",
            config.host, config.port, config.name
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(Self::Postgres(pool))
    }

    /// Connects to a `postgres://`, `postgresql://` or `sqlite:` URL.
    pub async fn connect_url(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections.max(1))
                .acquire_timeout(acquire_timeout)
                .connect(url)
                .await?;
            return Ok(Self::Postgres(pool));
        }
        if !url.starts_with("sqlite:") {
            let scheme = url.split_once(':').map_or(url, |(scheme, _)| scheme);
            return Err(sqlx::Error::Configuration(
                format!("unsupported database scheme `{scheme}`").into(),
            ));
        }

        let options = SqliteConnectOptions::from_str(url)?.foreign_keys(true);
        // Every connection to an in-memory database is a database of its own.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout);
        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        Ok(Self::Sqlite(pool))
    }

    /// Returns the dialect spoken by the pool.
    #[inline]
    pub fn dialect(&self) -> SqlDialect {
        match self {
            SqlPool::Postgres(_) => SqlDialect::Postgres,
            SqlPool::Sqlite(_) => SqlDialect::Sqlite,
        }
    }

    /// Runs `sql` in a transaction of its own.
    ///
    /// The transaction is committed when every statement succeeds and rolled
    /// back otherwise. With `read_only` the backend refuses writes: PostgreSQL
    /// runs a `READ ONLY` transaction, SQLite a `query_only` connection.
    pub async fn execute(
        &self,
        sql: &str,
        read_only: bool,
    ) -> Result<SqlOutcome, sqlx::Error> {
        match self {
            SqlPool::Postgres(pool) => postgres::execute(pool, sql, read_only).await,
            SqlPool::Sqlite(pool) => sqlite::execute(pool, sql, read_only).await,
        }
    }

    /// Runs a script of commands, such as the fixture schema.
    pub async fn run_script(&self, script: &str) -> Result<u64, sqlx::Error> {
        match self.execute(script, false).await? {
            SqlOutcome::Affected(affected) => Ok(affected),
            SqlOutcome::Rows(rows) => Ok(rows.len() as u64),
        }
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        match self {
            SqlPool::Postgres(pool) => pool.close().await,
            SqlPool::Sqlite(pool) => pool.close().await,
        }
    }
}

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::TryStreamExt as _;
use futures_util::future::BoxFuture;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Column, Connection, Either, Executor, Row, TypeInfo, ValueRef};

use super::{Record, SqlOutcome};

pub(super) fn execute<'a>(
    pool: &'a SqlitePool,
    sql: &'a str,
    read_only: bool,
) -> BoxFuture<'a, Result<SqlOutcome, sqlx::Error>> {
    Box::pin(async move {
        let mut conn = pool.acquire().await?;
        if !read_only {
            return in_transaction(&mut conn, sql).await;
        }

        // `query_only` outlives the transaction, so the connection has to
        // be switched back before it returns to the pool.
        (&mut *conn)
            .execute(sqlx::raw_sql("PRAGMA query_only = ON"))
            .await?;
        let result = in_transaction(&mut conn, sql).await;
        if let Err(err) = (&mut *conn)
            .execute(sqlx::raw_sql("PRAGMA query_only = OFF"))
            .await
        {
            warn!("cannot leave query-only mode, dropping the connection: {err}");
            drop(conn.detach());
        }
        result
    })
}

async fn in_transaction(
    conn: &mut SqliteConnection,
    sql: &str,
) -> Result<SqlOutcome, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let result = run(&mut tx, sql).await;
    match result {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

async fn run(conn: &mut SqliteConnection, sql: &str) -> Result<SqlOutcome, sqlx::Error> {
    let mut results = (&mut *conn).fetch_many(sqlx::raw_sql(sql));
    let mut records = Vec::new();
    let mut affected = 0;
    while let Some(result) = results.try_next().await? {
        match result {
            Either::Left(done) => affected += done.rows_affected(),
            Either::Right(row) => records.push(record(&row)),
        }
    }
    Ok(SqlOutcome::from_results(sql, records, affected))
}

fn record(row: &SqliteRow) -> Record {
    row.columns()
        .iter()
        .map(|column| (column.name().to_owned(), cell(row, column.ordinal())))
        .collect()
}

/// Decodes by the storage class of the value, declared column types are
/// only advisory in SQLite.
fn cell(row: &SqliteRow, idx: usize) -> Value {
    let storage_class = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_owned(),
        Err(err) => {
            debug!("cannot read column {idx}: {err}");
            return Value::Null;
        }
    };

    let decoded = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(idx).map(Value::from),
        "REAL" => row.try_get_unchecked::<f64, _>(idx).map(Value::from),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|v| Value::from(BASE64.encode(v))),
        _ => row.try_get_unchecked::<String, _>(idx).map(Value::from),
    };
    decoded.unwrap_or_else(|err| {
        debug!("cannot decode {storage_class} column {idx}: {err}");
        Value::Null
    })
}

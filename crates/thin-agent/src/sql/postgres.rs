use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::TryStreamExt as _;
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::{Column, Either, Executor, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use super::{Record, SqlOutcome};

pub(super) fn execute<'a>(
    pool: &'a PgPool,
    sql: &'a str,
    read_only: bool,
) -> BoxFuture<'a, Result<SqlOutcome, sqlx::Error>> {
    Box::pin(async move {
        let mut tx = pool.begin().await?;
        let result = run(&mut tx, sql, read_only).await;
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
    })
}

async fn run(
    conn: &mut PgConnection,
    sql: &str,
    read_only: bool,
) -> Result<SqlOutcome, sqlx::Error> {
    if read_only {
        (&mut *conn)
            .execute(sqlx::raw_sql("SET TRANSACTION READ ONLY"))
            .await?;
    }

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

fn record(row: &PgRow) -> Record {
    row.columns()
        .iter()
        .map(|column| {
            let value = cell(row, column.ordinal(), column.type_info().name());
            (column.name().to_owned(), value)
        })
        .collect()
}

fn cell(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(err) => {
            debug!("cannot read column {idx}: {err}");
            return Value::Null;
        }
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::from),
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::from),
        "NUMERIC" => row
            .try_get::<Decimal, _>(idx)
            .map(|v| v.to_f64().map_or(Value::Null, Value::from)),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|v| Value::from(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|v| Value::from(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|v| Value::from(v.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|v| Value::from(v.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx),
        "UUID" => row
            .try_get::<Uuid, _>(idx)
            .map(|v| Value::from(v.to_string())),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|v| Value::from(BASE64.encode(v))),
        // Simple-protocol results are text, which covers everything else
        // the server can print.
        _ => row.try_get_unchecked::<String, _>(idx).map(Value::from),
    };
    decoded.unwrap_or_else(|err| {
        debug!("cannot decode {type_name} column {idx}: {err}");
        Value::Null
    })
}

//! The record every tool call answers with.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured outcome of a tool call, rendered to JSON for the model.
///
/// Which fields are set depends on the tool and the outcome:
///
/// | outcome        | `status_code` | `row_count` | `data`       | `error` |
/// |----------------|---------------|-------------|--------------|---------|
/// | HTTP success   | status        |             | decoded body |         |
/// | HTTP rejection | status        |             |              | reason  |
/// | SQL rows       |               | N           | N records    |         |
/// | SQL command    |               | affected    |              |         |
/// | any failure    |               |             |              | message |
///
/// Unset fields are left out of the JSON rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the call did what was asked.
    pub success: bool,
    /// HTTP status of the response, if one was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Number of rows returned or affected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// The payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// What went wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// A successful HTTP exchange with its decoded body.
    pub fn http_ok(status_code: u16, data: Value) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            row_count: None,
            data: Some(data),
            error: None,
        }
    }

    /// A response with a non-success status.
    pub fn http_rejected(status_code: u16) -> Self {
        Self {
            success: false,
            status_code: Some(status_code),
            row_count: None,
            data: None,
            error: Some(format!(
                "Request failed with status code {status_code}"
            )),
        }
    }

    /// Rows returned by a query, one JSON object per row.
    pub fn rows(records: Vec<Map<String, Value>>) -> Self {
        Self {
            success: true,
            status_code: None,
            row_count: Some(records.len() as u64),
            data: Some(Value::Array(
                records.into_iter().map(Value::Object).collect(),
            )),
            error: None,
        }
    }

    /// A statement that returned no rows but changed `affected` of them.
    pub fn affected(affected: u64) -> Self {
        Self {
            success: true,
            status_code: None,
            row_count: Some(affected),
            data: None,
            error: None,
        }
    }

    /// Any failure without a status code.
    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            success: false,
            status_code: None,
            row_count: None,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Renders the envelope as the JSON text handed to the model.
    pub fn to_tool_output(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(r#"{{"success":false,"error":"unrenderable result: {err}"}}"#)
        })
    }
}

//! Relays WhatsApp messages received through Twilio to an agent and
//! answers with the agent's reply.
//!
//! Every callback is a single-turn run: the relay keeps no history and no
//! queue, duplicate callbacks are answered twice.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod twilio;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thin_agent::core::Agent;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::twilio::{SIGNATURE_HEADER, SignatureValidator};

/// Sent when the agent answers with nothing.
pub const NO_RESPONSE: &str = "⚠️ No response generated.";

/// State shared by the handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    agent: Arc<Agent>,
    validator: Option<SignatureValidator>,
    public_url: Option<String>,
}

impl AppState {
    /// Creates the state of a relay to `agent`, accepting unsigned
    /// callbacks.
    #[inline]
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            validator: None,
            public_url: None,
        }
    }

    /// Rejects callbacks not signed by `validator`.
    #[inline]
    pub fn with_validator(mut self, validator: SignatureValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Sets the public base URL used to check signatures.
    ///
    /// Without it the URL is rebuilt from the `X-Forwarded-Proto` and
    /// `Host` headers, which is wrong behind proxies that rewrite them.
    #[inline]
    pub fn with_public_url<S: Into<String>>(mut self, public_url: S) -> Self {
        self.public_url = Some(public_url.into());
        self
    }
}

/// Builds the relay routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn webhook(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    Form(params): Form<BTreeMap<String, String>>,
) -> Response {
    if let Some(validator) = &state.validator {
        let url = signed_url(state.public_url.as_deref(), &uri, &headers);
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !validator.validate(&url, &params, signature) {
            warn!("rejected a callback with a bad signature for {url}");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let body = params.get("Body").map_or("", |body| body.trim());
    let sender = params
        .get("From")
        .map_or("unknown", |from| twilio::sender_number(from));
    let span = info_span!("webhook message", sender);

    async {
        info!("received {} chars", body.chars().count());
        match state.agent.run(body).await {
            Ok(reply) => {
                let reply = if reply.trim().is_empty() {
                    NO_RESPONSE
                } else {
                    reply.as_str()
                };
                (
                    [(header::CONTENT_TYPE, "application/xml")],
                    twilio::message_response(reply),
                )
                    .into_response()
            }
            Err(err) => {
                error!("agent run failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Rebuilds the URL Twilio signed.
fn signed_url(public_url: Option<&str>, uri: &Uri, headers: &HeaderMap) -> String {
    let path_and_query = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    if let Some(base) = public_url {
        return format!("{}{path_and_query}", base.trim_end_matches('/'));
    }

    let scheme = first_value(headers, "x-forwarded-proto").unwrap_or("http");
    let host = first_value(headers, "x-forwarded-host")
        .or_else(|| first_value(headers, "host"))
        .unwrap_or("localhost");
    format!("{scheme}://{host}{path_and_query}")
}

/// Returns the first entry of a possibly comma-separated header.
fn first_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    let value = headers.get(name)?.to_str().ok()?;
    value.split(',').next().map(str::trim)
}

#[macro_use]
extern crate tracing;

use std::sync::Arc;

use anyhow::Context as _;
use thin_agent::agents::sql_agent;
use thin_agent::config::{DatabaseConfig, ModelConfig, Vars, env_lookup};
use thin_agent::sql::SqlPool;
use thin_agent::tools::SqlQueryTool;
use thin_agent_webhook::config::WebhookConfig;
use thin_agent_webhook::twilio::SignatureValidator;
use thin_agent_webhook::{AppState, router};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let vars = Vars::new(env_lookup());
    let model_config = ModelConfig::from_vars(&vars)?;
    let db_config = DatabaseConfig::from_vars(&vars)?;
    let webhook_config = WebhookConfig::from_vars(&vars)?;
    debug!("using {model_config:?}, {db_config:?}, {webhook_config:?}");

    let pool = SqlPool::connect(&db_config)
        .await
        .context("cannot connect to the database")?;
    let tool = SqlQueryTool::new(pool.clone()).with_read_only(db_config.read_only);
    let agent = sql_agent(model_config.provider(), tool);

    let mut state = AppState::new(Arc::new(agent));
    match (&webhook_config.auth_token, webhook_config.validate_signature) {
        (Some(auth_token), true) => {
            state = state.with_validator(SignatureValidator::new(auth_token));
        }
        _ => warn!("signature validation is disabled"),
    }
    if let Some(public_url) = &webhook_config.public_url {
        state = state.with_public_url(public_url);
    }

    let listener = TcpListener::bind(webhook_config.bind)
        .await
        .with_context(|| format!("cannot listen on {}", webhook_config.bind))?;
    info!("listening on {}", webhook_config.bind);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("cannot listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

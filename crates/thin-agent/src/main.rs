//! Terminal front end of the agents.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use thin_agent::Session;
use thin_agent::agents::{rest_agent, sql_agent};
use thin_agent::config::{DatabaseConfig, HttpConfig, ModelConfig, Vars, env_lookup};
use thin_agent::core::{Agent, AgentEvent};
use thin_agent::sql::SqlPool;
use thin_agent::tools::{HttpFetchTool, SqlQueryTool};
use tokio::io::{self, AsyncBufReadExt};
use tracing_subscriber::EnvFilter;

const BAR_CHAR: &str = "▎";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AgentKind {
    /// Fetches URLs with GET requests.
    Rest,
    /// Answers questions from the database.
    Sql,
}

/// Chat with an agent in the terminal.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The agent to talk to.
    #[arg(value_enum)]
    agent: AgentKind,

    /// Send a single message, print the answer and exit.
    #[arg(short, long)]
    message: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let vars = Vars::new(env_lookup());
    let model_config = ModelConfig::from_vars(&vars)?;
    debug!("using {model_config:?}");

    let agent = match cli.agent {
        AgentKind::Rest => {
            let http_config = HttpConfig::from_vars(&vars)?;
            let tool = HttpFetchTool::new(http_config.timeout)
                .context("cannot create the HTTP client")?;
            rest_agent(model_config.provider(), tool)
        }
        AgentKind::Sql => {
            let db_config = DatabaseConfig::from_vars(&vars)?;
            debug!("using {db_config:?}");
            let pool = SqlPool::connect(&db_config)
                .await
                .context("cannot connect to the database")?;
            let tool = SqlQueryTool::new(pool).with_read_only(db_config.read_only);
            sql_agent(model_config.provider(), tool)
        }
    };
    let mut session = Session::new(Arc::new(agent));

    if let Some(message) = cli.message {
        let reply = session.send_message(&message).await?;
        println!("{reply}");
        return Ok(());
    }
    repl(&mut session).await
}

async fn repl(session: &mut Session) -> anyhow::Result<()> {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    print_banner(session.agent());

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = read_line().await else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("{}\n", "Conversation cleared.".dimmed());
                continue;
            }
            _ => {}
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");
        progress_bar.enable_steady_tick(Duration::from_millis(100));

        let result = session
            .send_message_observed(input, {
                let progress_bar = progress_bar.clone();
                move |event| {
                    if let AgentEvent::ToolCall { name } = event {
                        progress_bar.set_message(format!("🔧 Calling {name}..."));
                    }
                }
            })
            .await;

        // Finish the progress bar before printing anything else.
        progress_bar.finish_and_clear();

        match result {
            Ok(reply) => {
                for line in reply.lines() {
                    println!("{}{}", BAR_CHAR.bright_cyan(), line.bright_white());
                }
                println!();
            }
            Err(err) => {
                error!("turn failed: {err}");
                println!("{}❌ {}\n", BAR_CHAR.bright_red(), err.bright_red());
            }
        }
    }
    Ok(())
}

fn print_banner(agent: &Agent) {
    println!("{} {}", "🤖".bright_cyan(), agent.name().bold());
    if !agent.description().is_empty() {
        println!("{}", agent.description().dimmed());
    }
    println!("{}\n", "/reset clears the conversation, /exit quits.".dimmed());
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

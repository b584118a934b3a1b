use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use escalation_bridge::{
    api,
    config::{BridgeConfig, DEFAULT_CONFIG_PATH},
    crypto::SigningContext,
    escalation::Escalator,
    jira::{JiraClient, TicketTemplate},
    slack::{build_routing_table, SlackApiClient},
    AppState,
};

/// How long in-flight escalations may run after the listener stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "escalation-bridge")]
#[command(about = "Files Jira issues for Slack threads flagged with a reaction")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Slack events webhook server (default)
    Serve,
    /// Resolve the configured channels and print the routing table
    Channels,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let config = BridgeConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Channels => print_channels(config).await,
    }
}

async fn serve(config: BridgeConfig) -> Result<()> {
    let shutdown = shutdown_on_signal();

    let slack = Arc::new(SlackApiClient::new(
        &config.slack.api_base,
        &config.slack.bot_token,
        config.slack_request_timeout(),
    )?);
    let jira = Arc::new(JiraClient::new(
        &config.jira.base_url,
        &config.jira.username,
        &config.jira.api_token,
        config.jira_request_timeout(),
    )?);

    let reporter_id = match &config.jira.reporter_account_id {
        Some(id) => id.clone(),
        None => jira
            .current_account_id()
            .await
            .context("Failed to look up Jira reporter account")?,
    };

    // The routing table must be complete before any request is served.
    let routes = build_routing_table(slack.as_ref(), &config.slack.channels, &shutdown)
        .await
        .context("Failed to resolve monitored Slack channels")?;
    for route in routes.routes() {
        tracing::info!(
            channel = %route.channel_name,
            id = %route.channel_id,
            emoji = %route.trigger_emoji,
            "Monitoring channel"
        );
    }

    let ticket = TicketTemplate {
        project_key: config.jira.project.clone(),
        issue_type: config.jira.issue_type.clone(),
        summary_template: config.jira.summary_template.clone(),
        reporter_id,
    };
    let escalator = Escalator::new(
        routes,
        slack.clone(),
        slack.clone(),
        jira,
        ticket,
        config.escalation_options(),
    );
    let signing = SigningContext::new(
        config.slack.signing_secret.clone(),
        config.clock_skew_tolerance(),
    );
    let state = Arc::new(AppState::new(signing, escalator));

    let app = api::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!("Escalation bridge listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    state.tasks.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, state.tasks.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            pending = state.tasks.len(),
            "Cancelling unfinished escalations"
        );
        state.cancel.cancel();
        state.tasks.wait().await;
    }

    tracing::info!("Escalation bridge stopped");
    Ok(())
}

async fn print_channels(config: BridgeConfig) -> Result<()> {
    let shutdown = shutdown_on_signal();
    let slack = SlackApiClient::new(
        &config.slack.api_base,
        &config.slack.bot_token,
        config.slack_request_timeout(),
    )?;

    let routes = build_routing_table(&slack, &config.slack.channels, &shutdown)
        .await
        .context("Failed to resolve monitored Slack channels")?;

    println!("{:<24} {:<14} EMOJI", "CHANNEL", "ID");
    for route in routes.routes() {
        println!(
            "{:<24} {:<14} :{}:",
            format!("#{}", route.channel_name),
            route.channel_id,
            route.trigger_emoji
        );
    }
    Ok(())
}

/// A token cancelled on Ctrl-C or SIGTERM.
fn shutdown_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        trigger.cancel();
    });
    token
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! `mailbridge` - forwards mail received over SMTP as DingTalk work
//! notifications.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mailbridge_core::{Bridge, Config};
use mailbridge_dingtalk::{Client, CredentialCache, DingTalkApi};
use mailbridge_smtp::Server;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mailbridge", version, about = "SMTP to DingTalk notification bridge")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailbridge=info,mailbridge_core=info,mailbridge_smtp=info,mailbridge_dingtalk=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).with_context(|| {
        format!(
            "failed to load {} (see config.example.json)",
            cli.config.display()
        )
    })?;

    let mut client = Client::new(config.credentials()?)?;
    if let Some(base_url) = &config.dingtalk.base_url {
        client = client
            .with_base_url(base_url.trim())
            .context("invalid dingtalk.base_url")?;
    }
    let api: Arc<dyn DingTalkApi> = Arc::new(client);
    let credentials = Arc::new(CredentialCache::new(Arc::clone(&api)));
    let contacts = Arc::new(config.contact_mapping());
    info!(contacts = contacts.len(), "contact mapping loaded");

    let bridge = Bridge::new(api, credentials, contacts, config.dispatch_options());
    let server = Server::new(config.server_config(), Arc::new(bridge));
    let listener = server
        .bind()
        .await
        .with_context(|| format!("failed to listen on {}", config.smtp.listen_addr))?;

    info!("Starting mailbridge");
    server.serve(listener, shutdown_signal()).await?;
    info!("mailbridge stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
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
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown requested");
}

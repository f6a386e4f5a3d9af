use anyhow::{Context, Result};
use clap::Parser;
use loqa_console::{
    create_router, AppState, Config, ConversationSession, NatsClient, NatsGenerationBackend,
    NatsSpeechBackend,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Voice and text conversation console for the loqa speech and LLM services
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/loqa-console")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    info!("Loqa Console v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let session_config = cfg.session_config();
    let nats_client = Arc::new(
        NatsClient::connect(&cfg.nats.url, session_config.session_id.clone())
            .await
            .context("Failed to connect to NATS")?,
    );

    let session = ConversationSession::spawn(
        session_config,
        Box::new(NatsSpeechBackend::new(Arc::clone(&nats_client))),
        Box::new(NatsGenerationBackend::new(nats_client)),
    )?;

    // Surface one-shot failures in the service log
    let mut notices = session.handle().subscribe_notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => warn!("[{:?}] {}", notice.source, notice.message),
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} notices", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let bind = args.bind.unwrap_or(cfg.service.http.bind);
    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", bind, port);

    let app = create_router(AppState::new(session.handle()));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    let stats = session.shutdown().await?;
    info!(
        "Session {} finished: {} messages, {} jobs started",
        stats.session_id, stats.messages_count, stats.jobs.started
    );

    Ok(())
}

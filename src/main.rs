use anyhow::{Context, Result};
use callstream::session::Providers;
use callstream::stt::NatsRecognizer;
use callstream::{create_router, AppState, Config};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "callstream", about = "Real-time voice call session pipeline")]
struct Args {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/callstream")]
    config: String,

    /// Override the configured bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let recognizer = Arc::new(
        NatsRecognizer::connect(
            &cfg.stt.nats_url,
            cfg.audio.sample_rate,
            cfg.audio.bridge_capacity,
        )
        .await,
    );
    let generator = callstream::reply::create_generator(&cfg.reply)?;
    let synthesizer = callstream::tts::create_synthesizer(&cfg.tts)?;
    let store = callstream::store::create_store(&cfg.store)?;

    let providers = Providers {
        recognizer,
        generator,
        synthesizer,
        store,
    };

    let bind = args.bind.unwrap_or_else(|| cfg.service.http.bind.clone());
    let port = args.port.unwrap_or(cfg.service.http.port);

    let state = AppState::new(cfg, providers);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind, port))?;

    info!("HTTP server listening on {}:{}", bind, port);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

use std::sync::Arc;

use anyhow::{Context, Result};
use call_relay::{
    create_router, AppState, CallRequest, CallStore, Config, JsonFileStore, MemoryStore,
    TelephonyClient, TwilioClient,
};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "call-relay", version, about = "Relay phone calls to a realtime speech service")]
struct Cli {
    /// Configuration file, without extension
    #[arg(long, default_value = "config/call-relay")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve telephony callbacks, media streams and the call API
    Serve,
    /// Place an outgoing call
    Call {
        #[arg(long)]
        to: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        instructions: Option<String>,
        #[arg(long)]
        greeting: Option<String>,
    },
    /// Print the telephony status of a call
    Status { call_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Loaded config: {}", cfg.service.name);

    let store = open_store(&cfg)?;
    let telephony: Arc<dyn TelephonyClient> = Arc::new(TwilioClient::new(&cfg.telephony));

    match cli.command {
        Command::Serve => serve(cfg, store, telephony).await,
        Command::Call {
            to,
            user_id,
            instructions,
            greeting,
        } => {
            let state = AppState::new(cfg, store, telephony);
            let call_id = state
                .calls
                .initiate_call(CallRequest {
                    to,
                    user_id,
                    instructions,
                    greeting,
                })
                .await?;
            println!("{}", call_id);
            Ok(())
        }
        Command::Status { call_id } => {
            let status = telephony.fetch_status(&call_id).await?;
            println!("{}", serde_json::to_string(&status)?.trim_matches('"'));
            Ok(())
        }
    }
}

fn open_store(cfg: &Config) -> Result<Arc<dyn CallStore>> {
    match &cfg.store.path {
        Some(path) => {
            info!("Storing call records under {}", path);
            Ok(Arc::new(JsonFileStore::new(path)?))
        }
        None => {
            info!("Storing call records in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn serve(
    cfg: Config,
    store: Arc<dyn CallStore>,
    telephony: Arc<dyn TelephonyClient>,
) -> Result<()> {
    cfg.validate()?;

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("Media stream endpoint: wss://{}/media-stream", cfg.public_host());

    let app = create_router(AppState::new(cfg, store, telephony));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

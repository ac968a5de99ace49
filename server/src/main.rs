//! promptcad dev server
//! - Design session store behind a REST API
//! - Interpretation against the chat collaborator
//! - WebSocket binary mesh streaming of the active design

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use promptcad::{
    ChatConfig, DesignSessionStore, HexColor, HttpChatClient, MeshConfig, RefineConfig, Refiner,
};
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod error;

pub struct AppState {
    pub store: RwLock<DesignSessionStore>,
    pub refiner: Refiner,
    pub mesh_config: MeshConfig,
    pub mesh_tx: broadcast::Sender<Vec<u8>>,
    pub current_mesh: RwLock<Option<Vec<u8>>>,
}

impl AppState {
    pub fn new(refiner: Refiner, mesh_config: MeshConfig) -> Self {
        let (mesh_tx, _) = broadcast::channel::<Vec<u8>>(16);
        Self {
            store: RwLock::new(DesignSessionStore::new()),
            refiner,
            mesh_config,
            mesh_tx,
            current_mesh: RwLock::new(None),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "promptcad-server")]
#[command(about = "Conversational 3D design server")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PROMPTCAD_BIND", default_value = "0.0.0.0:3001")]
    bind: SocketAddr,

    /// Chat collaborator endpoint
    #[arg(long, env = "PROMPTCAD_CHAT_URL", default_value = "http://localhost:3000/api/chat")]
    chat_url: String,

    /// Chat request timeout in seconds
    #[arg(long, env = "PROMPTCAD_CHAT_TIMEOUT_SECS", default_value = "60")]
    chat_timeout_secs: u64,

    /// Segment count for curved primitives
    #[arg(long, env = "PROMPTCAD_SEGMENTS", default_value = "32")]
    segments: usize,

    /// Replace the built-in system prompt
    #[arg(long, env = "PROMPTCAD_SYSTEM_PROMPT")]
    system_prompt: Option<String>,

    /// Fill color for the fallback box
    #[arg(long, default_value = "#cccccc")]
    fallback_color: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let client = HttpChatClient::new(&ChatConfig {
        endpoint: args.chat_url.clone(),
        timeout: Duration::from_secs(args.chat_timeout_secs),
    })
    .context("Failed to build chat client")?;
    let refine_config = RefineConfig {
        system_prompt: args.system_prompt,
        fallback_color: HexColor::parse(&args.fallback_color)
            .with_context(|| format!("Bad fallback color: {}", args.fallback_color))?,
    };
    let mesh_config = MeshConfig {
        circular_segments: args.segments,
    };

    let state = Arc::new(AppState::new(
        Refiner::new(Arc::new(client), refine_config),
        mesh_config,
    ));

    let app = api::router(state).layer(CorsLayer::permissive());

    info!("Chat collaborator: {}", args.chat_url);
    info!("Server: http://{}", args.bind);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}

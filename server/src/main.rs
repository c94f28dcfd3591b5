use anyhow::{Context, Result};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use boat_match3::{Rules, RulesConfig};
use boat_match3_protocol::{ClientRequest, ServerMessage};

mod store;
use store::SessionStore;

/// Session authority for the boat-trip match-3 challenge.
#[derive(Debug, Parser)]
#[command(name = "boat-match3-server", version)]
struct Args {
    /// Address to listen on for WebSocket clients.
    #[arg(short, long, env = "BIND_ADDR", default_value = "127.0.0.1:9001")]
    bind: String,

    /// Seconds on the clock for a new session.
    #[arg(long, env = "GAME_DURATION", default_value = "60", value_name = "SECS")]
    game_duration: u32,

    /// Manual refresh cooldown for a new session.
    #[arg(long, env = "REFRESH_BASE", default_value = "10", value_name = "SECS")]
    refresh_base: u32,
}

async fn handle_connection(ws_stream: WebSocketStream<TcpStream>, store: SessionStore) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    while let Some(message) = ws_receiver.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("websocket error: {e}");
                break;
            }
        };

        let reply = match serde_json::from_str::<ClientRequest>(&text) {
            Ok(request) => {
                debug!(endpoint = request.action.endpoint(), "request");
                store.handle(&request.token, request.action).await
            }
            Err(e) => ServerMessage::Rejected {
                reason: format!("invalid request: {e}"),
            },
        };

        let json = match serde_json::to_string(&reply) {
            Ok(json) => json,
            Err(e) => {
                error!("failed to encode reply: {e}");
                break;
            }
        };
        if ws_sender.send(Message::Text(json)).await.is_err() {
            break;
        }
    }

    info!("client disconnected");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let rules = Rules::new(RulesConfig {
        game_duration: args.game_duration,
        refresh_base: args.refresh_base,
        ..RulesConfig::default()
    });
    let store = SessionStore::new(rules);
    store.spawn_ticker();

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(addr = %args.bind, "session authority listening");

    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let store = store.clone();
        let span = tracing::info_span!("conn", id = %Uuid::new_v4(), %peer);

        tokio::spawn(
            async move {
                info!("new connection");
                match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws_stream) => handle_connection(ws_stream, store).await,
                    Err(e) => warn!("websocket handshake error: {e}"),
                }
            }
            .instrument(span),
        );
    }
}

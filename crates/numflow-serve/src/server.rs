//! WebSocket server exposing a numflow engine

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use numflow::{Engine, FlowError};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientMessage, ServerMessage, WireValue};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

type ClientId = u64;

/// Shared state across all client handlers
struct SharedState {
    connected: AtomicUsize,
    next_id: AtomicU64,
}

/// Serves one engine to many WebSocket clients. Each connection evaluates
/// in its own session, so definitions never leak between clients.
pub struct NumflowServer {
    engine: Engine,
    state: Arc<SharedState>,
}

impl NumflowServer {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            state: Arc::new(SharedState {
                connected: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Bind `addr` and accept connections until an accept fails
    pub async fn listen(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!("numflow worker listening on ws://{}", listener.local_addr()?);

        loop {
            let (stream, peer) = listener.accept().await?;
            let session = self.engine.session();
            let state = self.state.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, session, state).await {
                    warn!("connection from {peer} failed: {e}");
                }
            });
        }
    }

    /// Number of currently connected clients
    pub fn connections(&self) -> usize {
        self.state.connected.load(Ordering::SeqCst)
    }
}

async fn handle_connection(
    stream: TcpStream,
    session: Engine,
    state: Arc<SharedState>,
) -> Result<(), ServerError> {
    let ws = accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client_id = state.next_id.fetch_add(1, Ordering::SeqCst);
    state.connected.fetch_add(1, Ordering::SeqCst);
    info!("client {client_id} connected");

    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("client {client_id} read error: {e}");
                break;
            }
        };

        let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(request) => handle_message(&session, request).await,
            Err(e) => ServerMessage::error(None, format!("Invalid message: {e}")),
        };
        send_message(&tx, client_id, &reply);
    }

    state.connected.fetch_sub(1, Ordering::SeqCst);
    info!("client {client_id} disconnected");

    drop(tx);
    forward_task.abort();
    Ok(())
}

async fn handle_message(session: &Engine, msg: ClientMessage) -> ServerMessage {
    match msg {
        ClientMessage::Run { id, source } => match session.run(&source).await {
            Ok(value) => ServerMessage::Result {
                id,
                value: WireValue::from(&value),
            },
            Err(e) => failure(Some(id), e),
        },

        ClientMessage::Define { name, source } => match session.run(&source).await {
            Ok(value) => {
                session.define_value(name.clone(), value);
                ServerMessage::Defined { name }
            }
            Err(e) => failure(None, e),
        },

        ClientMessage::Help { name } => {
            let text = session.registry().help(&name);
            ServerMessage::Help { name, text }
        }

        ClientMessage::Locality => {
            let (worker, workers) = session
                .config()
                .locality
                .as_ref()
                .map_or((0, 1), |l| (l.worker, l.workers));
            ServerMessage::Locality { worker, workers }
        }
    }
}

fn failure(id: Option<u64>, err: FlowError) -> ServerMessage {
    match &err {
        FlowError::Eval(e) => ServerMessage::eval_error(id, e),
        _ => ServerMessage::error(id, err.to_string()),
    }
}

fn send_message(tx: &mpsc::UnboundedSender<Message>, client_id: ClientId, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if tx.send(Message::Text(json.into())).is_err() {
                debug!("client {client_id} went away before the reply");
            }
        }
        Err(e) => error!("failed to encode reply for client {client_id}: {e}"),
    }
}

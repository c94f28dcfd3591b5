//! Optimistic actions against the session authority.
//!
//! The engine never awaits: a bridge task owns the socket and talks to the
//! engine through unbounded channels, and [`SessionSync::poll`] picks replies up
//! during `update`. At most one request is in flight; anything submitted while
//! busy is dropped rather than queued.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use boat_match3_protocol::{
    ClientRequest, EndSummary, GameAction, GameState, Grid, ServerMessage, UpgradeKind,
};

use crate::effects::SpecialTile;
use crate::error::SyncError;

/// Engine side of the connection to the authority.
#[derive(Debug)]
pub struct SessionLink {
    requests: UnboundedSender<ClientRequest>,
    replies: UnboundedReceiver<ServerMessage>,
}

/// The other ends of a [`SessionLink`]: whoever holds this answers requests.
#[derive(Debug)]
pub struct AuthorityEnd {
    pub requests: UnboundedReceiver<ClientRequest>,
    pub replies: UnboundedSender<ServerMessage>,
}

impl SessionLink {
    /// An in-process link, for embedding an authority directly or for tests.
    pub fn pair() -> (SessionLink, AuthorityEnd) {
        let (request_tx, request_rx) = unbounded_channel();
        let (reply_tx, reply_rx) = unbounded_channel();
        (
            SessionLink {
                requests: request_tx,
                replies: reply_rx,
            },
            AuthorityEnd {
                requests: request_rx,
                replies: reply_tx,
            },
        )
    }

    /// Connects to a WebSocket authority and spawns the bridge task. Must be
    /// called inside a tokio runtime.
    pub async fn connect(url: &str) -> Result<SessionLink, SyncError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SyncError::Connect(e.to_string()))?;
        info!(url, "connected to session authority");

        let (link, authority) = SessionLink::pair();
        tokio::spawn(run_bridge(ws_stream, authority));
        Ok(link)
    }

    fn send(&self, request: ClientRequest) -> Result<(), SyncError> {
        self.requests
            .send(request)
            .map_err(|_| SyncError::Disconnected)
    }

    fn try_recv(&mut self) -> Result<Option<ServerMessage>, SyncError> {
        match self.replies.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SyncError::Disconnected),
        }
    }
}

async fn run_bridge<S>(ws_stream: tokio_tungstenite::WebSocketStream<S>, authority: AuthorityEnd)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();
    let AuthorityEnd {
        mut requests,
        replies,
    } = authority;

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(request) = request else {
                    debug!("engine dropped its link, closing bridge");
                    let _ = write.send(Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&request) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("failed to encode request: {e}");
                        let _ = replies.send(ServerMessage::Rejected { reason: e.to_string() });
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json)).await {
                    warn!("failed to send request: {e}");
                    break;
                }
            }

            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = serde_json::from_str::<ServerMessage>(&text).unwrap_or_else(|e| {
                            warn!("malformed reply from authority: {e}");
                            ServerMessage::Rejected { reason: format!("malformed reply: {e}") }
                        });
                        if replies.send(reply).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("session authority closed the connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("websocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// An action the engine wants the authority to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Session { start: bool, reset: bool },
    /// `snapshot` is the grid before the optimistic swap.
    Move { from: usize, to: usize, snapshot: Grid },
    Special { kind: SpecialTile, index: usize },
    Upgrade { choice: UpgradeKind },
    Refresh,
    End,
}

impl Proposal {
    pub fn action(&self) -> GameAction {
        match self {
            Proposal::Session { start, reset } => GameAction::Session {
                start: *start,
                reset: *reset,
            },
            Proposal::Move { from, to, .. } => GameAction::Move {
                from: *from,
                to: *to,
            },
            Proposal::Special {
                kind: SpecialTile::Bomb,
                index,
            } => GameAction::Bomb { index: *index },
            Proposal::Special {
                kind: SpecialTile::Crystal,
                index,
            } => GameAction::Crystal { index: *index },
            Proposal::Upgrade { choice } => GameAction::Upgrade { choice: *choice },
            Proposal::Refresh => GameAction::Refresh,
            Proposal::End => GameAction::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Committed { proposal: Proposal, state: GameState },
    Ended { summary: EndSummary },
    RolledBack { proposal: Proposal, error: SyncError },
}

#[derive(Debug, Default)]
pub struct SessionSync {
    link: Option<SessionLink>,
    token: Option<String>,
    in_flight: Option<Proposal>,
}

impl SessionSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, link: SessionLink, token: impl Into<String>) {
        self.link = Some(link);
        self.token = Some(token.into());
        self.in_flight = None;
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&Proposal> {
        self.in_flight.as_ref()
    }

    pub fn submit(&mut self, proposal: Proposal) -> Result<(), SyncError> {
        if self.is_busy() {
            debug!(action = proposal.action().endpoint(), "request in flight, dropping action");
            return Err(SyncError::Busy);
        }
        let Some(link) = self.link.as_ref() else {
            return Err(SyncError::NotConnected);
        };
        let token = match self.token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Err(SyncError::NotAuthenticated),
        };

        let action = proposal.action();
        debug!(endpoint = action.endpoint(), "submitting");
        if let Err(e) = link.send(ClientRequest { token, action }) {
            self.link = None;
            return Err(e);
        }
        self.in_flight = Some(proposal);
        Ok(())
    }

    /// Returns the outcome of the in-flight request once its reply has arrived.
    pub fn poll(&mut self) -> Option<Completion> {
        let link = self.link.as_mut()?;
        let reply = match link.try_recv() {
            Ok(Some(reply)) => reply,
            Ok(None) => return None,
            Err(error) => {
                warn!("lost connection to session authority");
                self.link = None;
                let proposal = self.in_flight.take()?;
                return Some(Completion::RolledBack { proposal, error });
            }
        };

        let Some(proposal) = self.in_flight.take() else {
            warn!(?reply, "reply with no request in flight, ignoring");
            return None;
        };

        let completion = match (proposal, reply) {
            (Proposal::End, ServerMessage::Ended { summary }) => Completion::Ended { summary },
            (proposal, ServerMessage::Rejected { reason }) => {
                debug!(endpoint = proposal.action().endpoint(), %reason, "rolled back");
                Completion::RolledBack {
                    proposal,
                    error: SyncError::Rejected(reason),
                }
            }
            (Proposal::End, ServerMessage::State { .. }) => Completion::RolledBack {
                proposal: Proposal::End,
                error: SyncError::UnexpectedReply,
            },
            (proposal, ServerMessage::State { state }) => Completion::Committed { proposal, state },
            (proposal, ServerMessage::Ended { .. }) => Completion::RolledBack {
                proposal,
                error: SyncError::UnexpectedReply,
            },
        };
        Some(completion)
    }
}

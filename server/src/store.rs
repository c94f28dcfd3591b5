use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info};

use boat_match3::{RuleError, Rules};
use boat_match3_protocol::{EndSummary, GameAction, GameState, ServerMessage};

struct Sessions {
    by_token: HashMap<String, GameState>,
    personal_bests: HashMap<String, u32>,
    rng: StdRng,
}

/// Every player's live session, keyed by bearer token, plus their best scores.
/// A session is dropped once it has been ended; best scores are kept per token.
/// Nothing is persisted; a restart forgets everything.
#[derive(Clone)]
pub struct SessionStore {
    rules: Arc<Rules>,
    inner: Arc<Mutex<Sessions>>,
}

impl SessionStore {
    pub fn new(rules: Rules) -> Self {
        Self::with_rng(rules, StdRng::from_entropy())
    }

    pub fn with_rng(rules: Rules, rng: StdRng) -> Self {
        Self {
            rules: Arc::new(rules),
            inner: Arc::new(Mutex::new(Sessions {
                by_token: HashMap::new(),
                personal_bests: HashMap::new(),
                rng,
            })),
        }
    }

    /// Applies one action. Rejected actions leave the session untouched.
    pub async fn handle(&self, token: &str, action: GameAction) -> ServerMessage {
        if token.is_empty() {
            return rejected("missing bearer token");
        }
        let endpoint = action.endpoint();
        let mut inner = self.inner.lock().await;
        let Sessions {
            by_token,
            personal_bests,
            rng,
        } = &mut *inner;

        if let GameAction::Session { start, reset } = action {
            let current = by_token.remove(token);
            let state = self.rules.open_session(current, start, reset, rng);
            by_token.insert(token.to_string(), state.clone());
            debug!(endpoint, status = ?state.status, "session opened");
            return ServerMessage::State { state };
        }

        let Some(current) = by_token.get_mut(token) else {
            return rejected("no session");
        };

        if let GameAction::End = action {
            let final_score = self.rules.end(current);
            by_token.remove(token);
            let best = personal_bests.entry(token.to_string()).or_insert(0);
            let was_improved = final_score > *best;
            *best = (*best).max(final_score);
            info!(final_score, personal_best = *best, was_improved, "session ended");
            return ServerMessage::Ended {
                summary: EndSummary {
                    final_score,
                    personal_best: *best,
                    was_improved,
                },
            };
        }

        let mut next = current.clone();
        let result: Result<(), RuleError> = match action {
            GameAction::Move { from, to } => self.rules.apply_move(&mut next, from, to, rng).map(drop),
            GameAction::Bomb { index } => self.rules.apply_bomb(&mut next, index, rng).map(drop),
            GameAction::Crystal { index } => self.rules.apply_crystal(&mut next, index, rng).map(drop),
            GameAction::Upgrade { choice } => self.rules.choose_upgrade(&mut next, choice).map(drop),
            GameAction::Refresh => self.rules.refresh(&mut next, rng),
            GameAction::Session { .. } | GameAction::End => Ok(()),
        };

        match result {
            Ok(()) => {
                *current = next.clone();
                debug!(endpoint, score = next.score, "applied");
                ServerMessage::State { state: next }
            }
            Err(e) => {
                debug!(endpoint, "rejected: {e}");
                rejected(e.to_string())
            }
        }
    }

    /// Runs every live clock down. Returns how many sessions ran out of time.
    pub async fn tick(&self, seconds: u32) -> usize {
        let mut inner = self.inner.lock().await;
        let mut ended = 0;
        for state in inner.by_token.values_mut() {
            if self.rules.tick(state, seconds) {
                ended += 1;
            }
        }
        ended
    }

    pub async fn session(&self, token: &str) -> Option<GameState> {
        self.inner.lock().await.by_token.get(token).cloned()
    }

    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let ended = store.tick(1).await;
                if ended > 0 {
                    info!(ended, "sessions ran out of time");
                }
            }
        })
    }
}

fn rejected(reason: impl Into<String>) -> ServerMessage {
    ServerMessage::Rejected {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boat_match3_protocol::Status;

    fn store() -> SessionStore {
        SessionStore::with_rng(Rules::default(), StdRng::seed_from_u64(17))
    }

    async fn started(store: &SessionStore, token: &str) -> GameState {
        match store
            .handle(token, GameAction::Session { start: true, reset: false })
            .await
        {
            ServerMessage::State { state } => state,
            other => panic!("expected state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let reply = store()
            .handle("", GameAction::Session { start: true, reset: false })
            .await;
        assert!(matches!(reply, ServerMessage::Rejected { .. }));
    }

    #[tokio::test]
    async fn actions_need_a_session() {
        let reply = store().handle("alice", GameAction::Refresh).await;
        assert_eq!(reply, rejected("no session"));
    }

    #[tokio::test]
    async fn session_is_kept_until_reset() {
        let store = store();
        let first = started(&store, "alice").await;
        assert_eq!(first.status, Status::Active);

        let again = started(&store, "alice").await;
        assert_eq!(again, first);

        let reply = store
            .handle("alice", GameAction::Session { start: true, reset: true })
            .await;
        let ServerMessage::State { state } = reply else {
            panic!("expected state");
        };
        assert_ne!(state.grid, first.grid);
    }

    #[tokio::test]
    async fn rejected_move_keeps_the_session() {
        let store = store();
        let before = started(&store, "bob").await;

        let reply = store.handle("bob", GameAction::Move { from: 0, to: 12 }).await;

        assert!(matches!(reply, ServerMessage::Rejected { .. }));
        assert_eq!(store.session("bob").await, Some(before));
    }

    #[tokio::test]
    async fn bomb_without_stock_is_rejected() {
        let store = store();
        started(&store, "bob").await;
        let reply = store.handle("bob", GameAction::Bomb { index: 3 }).await;
        assert_eq!(reply, rejected("no Bomb left"));
    }

    #[tokio::test]
    async fn valid_move_commits() {
        let store = store();
        started(&store, "carol").await;

        let reply = store.handle("carol", GameAction::Move { from: 0, to: 1 }).await;

        let ServerMessage::State { state } = reply else {
            panic!("expected state");
        };
        assert_eq!(store.session("carol").await, Some(state));
    }

    #[tokio::test]
    async fn end_tracks_personal_best() {
        let store = store();
        started(&store, "dave").await;
        {
            let mut inner = store.inner.lock().await;
            inner.by_token.get_mut("dave").unwrap().score = 120;
        }

        let reply = store.handle("dave", GameAction::End).await;
        assert_eq!(
            reply,
            ServerMessage::Ended {
                summary: EndSummary {
                    final_score: 120,
                    personal_best: 120,
                    was_improved: true
                }
            }
        );

        assert_eq!(store.session("dave").await, None);
        assert_eq!(
            store.handle("dave", GameAction::Refresh).await,
            rejected("no session")
        );

        store
            .handle("dave", GameAction::Session { start: true, reset: false })
            .await;
        let ServerMessage::Ended { summary } = store.handle("dave", GameAction::End).await else {
            panic!("expected summary");
        };
        assert_eq!(summary.final_score, 0);
        assert_eq!(summary.personal_best, 120);
        assert!(!summary.was_improved);
    }

    #[tokio::test]
    async fn tick_ends_sessions_at_zero() {
        let store = store();
        started(&store, "erin").await;

        assert_eq!(store.tick(59).await, 0);
        assert_eq!(store.tick(1).await, 1);
        let state = store.session("erin").await.unwrap();
        assert_eq!(state.time_left, 0);
        assert_eq!(state.status, Status::Ended);

        let reply = store.handle("erin", GameAction::Refresh).await;
        assert!(matches!(reply, ServerMessage::Rejected { .. }));
    }
}

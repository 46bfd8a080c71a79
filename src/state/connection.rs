//! A logged-in player and their game
//!
//! Everything mutable about a connection sits behind one mutex: the game
//! session, the notification sender and the chat worker. HTTP handlers,
//! round deadlines and chat votes all go through that lock, so they always
//! see a consistent session.
//!
//! Deadlines and chat messages don't call into the session directly. They
//! are queued as [`SessionEvent`]s and applied one at a time by a worker
//! task owned by the connection.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use super::chat::ChatMessage;
use crate::catalog::Catalog;
use crate::error::GameError;
use crate::game::score::GameSummary;
use crate::game::timer::RoundToken;
use crate::game::{DeadlineSink, GameRequest, GameSession, RoundOutcome};
use crate::protocol::{GameStatus, ServerMessage};
use crate::types::{ChannelName, RoundView, UserId};

const NOTIFY_CAPACITY: usize = 100;

#[derive(Debug)]
pub enum SessionEvent {
    Deadline(RoundToken),
    Chat(ChatMessage),
}

#[derive(Debug)]
struct ConnectionInner {
    session: Option<GameSession>,
    notifier: Option<broadcast::Sender<ServerMessage>>,
    worker: Option<JoinHandle<()>>,
    closed: bool,
}

impl ConnectionInner {
    fn notify(&self, msg: ServerMessage) {
        if let Some(tx) = &self.notifier {
            // no subscribers is fine
            let _ = tx.send(msg);
        }
    }

    fn session_mut(&mut self) -> Result<&mut GameSession, GameError> {
        self.session.as_mut().ok_or(GameError::NoGame)
    }

    /// Publish a resolved round and drop the session after the last one
    fn finish_round(&mut self, username: &str, outcome: &RoundOutcome) {
        self.notify(ServerMessage::RoundEnd(outcome.clone()));
        if let Some(game) = &outcome.game {
            tracing::info!(
                "Game of {} completed: streamer {} points, chat {} points",
                username,
                game.streamer_points,
                game.chat_points
            );
            self.session = None;
        }
    }
}

#[derive(Debug)]
pub struct Connection {
    id: UserId,
    channel: ChannelName,
    started: DateTime<Utc>,
    /// Unix millis of the last request or websocket frame
    last_activity: AtomicI64,
    events: mpsc::UnboundedSender<SessionEvent>,
    inner: Mutex<ConnectionInner>,
}

impl Connection {
    /// Create a connection and spawn its event worker
    pub fn open(id: UserId, channel: ChannelName) -> Arc<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        let now = Utc::now();

        Arc::new_cyclic(|weak: &Weak<Connection>| {
            let worker = tokio::spawn(run_worker(weak.clone(), rx));
            Self {
                id,
                channel,
                started: now,
                last_activity: AtomicI64::new(now.timestamp_millis()),
                events,
                inner: Mutex::new(ConnectionInner {
                    session: None,
                    notifier: Some(notifier),
                    worker: Some(worker),
                    closed: false,
                }),
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn touch(&self) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let last = self.last_activity.load(Ordering::Relaxed);
        let idle = now.timestamp_millis().saturating_sub(last);
        Duration::from_millis(idle.max(0).unsigned_abs())
    }

    /// Notifications for websocket clients. `None` once closed.
    pub async fn subscribe(&self) -> Option<broadcast::Receiver<ServerMessage>> {
        self.inner.lock().await.notifier.as_ref().map(|tx| tx.subscribe())
    }

    /// Queue a chat message for the worker. False once the worker is gone.
    pub fn push_chat(&self, msg: ChatMessage) -> bool {
        self.events.send(SessionEvent::Chat(msg)).is_ok()
    }

    fn deadline_sink(&self) -> DeadlineSink {
        let events = self.events.clone();
        Arc::new(move |token| {
            let _ = events.send(SessionEvent::Deadline(token));
        })
    }

    pub async fn start_game(
        &self,
        catalog: &Catalog,
        request: &GameRequest,
    ) -> Result<RoundView, GameError> {
        let mut inner = self.inner.lock().await;
        if inner.session.is_some() {
            return Err(GameError::GameInProgress);
        }

        let session = {
            let mut rng = rand::rng();
            GameSession::start(catalog, request, &mut rng, self.deadline_sink())?
        };
        tracing::info!(
            "Game started for {}: {} rounds, {}s per round",
            self.id,
            session.round_count(),
            session.round_duration().as_secs()
        );

        let round = session.current_round()?;
        inner.session = Some(session);
        Ok(round)
    }

    pub async fn current_round(&self) -> Result<RoundView, GameError> {
        let inner = self.inner.lock().await;
        inner
            .session
            .as_ref()
            .ok_or(GameError::NoGame)?
            .current_round()
    }

    pub async fn status(&self) -> Result<GameStatus, GameError> {
        let inner = self.inner.lock().await;
        let session = inner.session.as_ref().ok_or(GameError::NoGame)?;
        let current_round = session
            .current_round()
            .map(|r| r.current_round)
            .unwrap_or(0);
        Ok(GameStatus {
            phase: session.phase(),
            current_round,
            max_round: session.round_count(),
            summary: session.summary(),
        })
    }

    /// Phase of the connection's game, `Idle` without one
    pub async fn streamer_vote(&self, token: &str) -> Result<usize, GameError> {
        let mut inner = self.inner.lock().await;
        let session = inner.session_mut()?;
        let vote = session.cast_streamer_vote(token)?;
        let chat_vote_count = session.chat_vote_count();

        tracing::debug!("Streamer {} voted {}", self.id, vote);
        inner.notify(ServerMessage::StreamerVote {
            username: self.id.clone(),
            vote,
            chat_vote_count,
        });
        Ok(vote)
    }

    /// Apply one chat message. The broadcaster's messages count as the
    /// streamer vote; a second one in the same round is ignored.
    pub async fn handle_chat(&self, msg: &ChatMessage) {
        let mut inner = self.inner.lock().await;
        let Some(session) = inner.session.as_mut() else {
            return;
        };

        let notification = if msg.is_broadcaster {
            match session.cast_streamer_vote(&msg.text) {
                Ok(vote) => ServerMessage::StreamerVote {
                    username: msg.username.clone(),
                    vote,
                    chat_vote_count: session.chat_vote_count(),
                },
                Err(_) => return,
            }
        } else {
            match session.cast_chat_vote(&msg.username, &msg.text) {
                Some(vote) => ServerMessage::ChatVote {
                    username: msg.username.clone(),
                    vote,
                    chat_vote_count: session.chat_vote_count(),
                },
                None => return,
            }
        };

        tracing::debug!("Chat vote in {}: {:?}", msg.channel, notification);
        inner.notify(notification);
    }

    /// Close the open round on request
    pub async fn advance(&self) -> Result<RoundOutcome, GameError> {
        let mut inner = self.inner.lock().await;
        let outcome = inner.session_mut()?.advance()?;
        inner.finish_round(&self.id, &outcome);
        Ok(outcome)
    }

    /// Close the open round because its deadline passed
    pub async fn on_round_deadline(&self, token: RoundToken) -> Option<RoundOutcome> {
        let mut inner = self.inner.lock().await;
        let outcome = inner.session.as_mut()?.resolve_on_deadline(token)?;
        inner.finish_round(&self.id, &outcome);
        Some(outcome)
    }

    pub async fn end_game(&self) -> Result<GameSummary, GameError> {
        let mut inner = self.inner.lock().await;
        let mut session = inner.session.take().ok_or(GameError::NoGame)?;
        let summary = session.end_game()?;

        tracing::info!("Game of {} ended early", self.id);
        inner.notify(ServerMessage::GameEnd(summary));
        Ok(summary)
    }

    /// Tear down the game, the notification channel and the chat worker.
    /// Returns false if the connection was already closed.
    pub async fn close(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return false;
        }
        inner.closed = true;

        if let Some(mut session) = inner.session.take() {
            let _ = session.end_game();
        }
        inner.notifier = None;
        if let Some(worker) = inner.worker.take() {
            worker.abort();
        }

        tracing::info!(
            "Connection of {} closed after {}s",
            self.id,
            (Utc::now() - self.started).num_seconds()
        );
        true
    }
}

async fn run_worker(conn: Weak<Connection>, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(conn) = conn.upgrade() else {
            break;
        };
        match event {
            SessionEvent::Deadline(token) => {
                conn.on_round_deadline(token).await;
            }
            SessionEvent::Chat(msg) => conn.handle_chat(&msg).await,
        }
    }
}

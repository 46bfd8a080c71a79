use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::chat::{normalize_channel, ChatMessage};
use super::connection::Connection;
use crate::types::{ChannelName, UserId};

/// Live connections by identity, plus the token and chat channel indexes
/// pointing at them. Each map has its own lock, separate from the
/// connections' session locks.
///
/// The indexes hold the connection itself rather than its identity, so
/// closing one connection never touches entries of a later connection
/// for the same identity.
#[derive(Debug, Default)]
pub struct Registry {
    connections: RwLock<HashMap<UserId, Arc<Connection>>>,
    tokens: RwLock<HashMap<String, Arc<Connection>>>,
    channels: RwLock<HashMap<ChannelName, Arc<Connection>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection for `id`. Returns `None` if one is already live;
    /// the existing connection is never replaced.
    pub async fn create(&self, id: &str, channel: &str) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(id) {
            return None;
        }
        let conn = Connection::open(id.to_string(), normalize_channel(channel));
        connections.insert(id.to_string(), conn.clone());
        tracing::info!("Connection opened for {}", id);
        Some(conn)
    }

    pub async fn lookup(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.read().await.get(id).cloned()
    }

    async fn is_registered(&self, conn: &Arc<Connection>) -> bool {
        self.connections
            .read()
            .await
            .get(conn.id())
            .is_some_and(|current| Arc::ptr_eq(current, conn))
    }

    pub async fn issue_token(&self, conn: &Arc<Connection>) -> String {
        let token = ulid::Ulid::new().to_string();
        self.tokens.write().await.insert(token.clone(), conn.clone());
        token
    }

    /// The live connection a token was issued to
    pub async fn by_token(&self, token: &str) -> Option<Arc<Connection>> {
        let conn = self.tokens.read().await.get(token).cloned()?;
        self.is_registered(&conn).await.then_some(conn)
    }

    /// Route the connection's chat channel to it
    pub async fn join_channel(&self, conn: &Arc<Connection>) {
        let channel = conn.channel().to_string();
        let mut channels = self.channels.write().await;
        if let Some(previous) = channels.get(&channel) {
            if !Arc::ptr_eq(previous, conn) {
                tracing::warn!(
                    "Channel {} was joined by {}, now routed to {}",
                    channel,
                    previous.id(),
                    conn.id()
                );
            }
        }
        channels.insert(channel, conn.clone());
    }

    /// Hand a chat message to the connection holding its channel
    pub async fn dispatch_chat(&self, msg: ChatMessage) -> bool {
        let channel = normalize_channel(&msg.channel);
        let Some(conn) = self.channels.read().await.get(&channel).cloned() else {
            tracing::debug!("Dropping chat message for unjoined channel {}", channel);
            return false;
        };
        conn.push_chat(msg)
    }

    /// Remove this exact connection and everything pointing at it, then
    /// close it. Returns `false` if it is no longer the registered one.
    pub async fn close(&self, conn: &Arc<Connection>) -> bool {
        {
            let mut connections = self.connections.write().await;
            match connections.get(conn.id()) {
                Some(current) if Arc::ptr_eq(current, conn) => {
                    connections.remove(conn.id());
                }
                _ => return false,
            }
        }
        self.tokens
            .write()
            .await
            .retain(|_, owner| !Arc::ptr_eq(owner, conn));
        self.channels
            .write()
            .await
            .retain(|_, owner| !Arc::ptr_eq(owner, conn));
        conn.close().await
    }

    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

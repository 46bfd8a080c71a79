pub mod chat;
pub mod connection;
pub mod registry;

use std::sync::Arc;

use crate::auth::Accounts;
use crate::catalog::export::export_categories;
use crate::catalog::{Catalog, CatalogStats, QuestionRepository};
use crate::config::Config;
use crate::error::{ApiError, CatalogError, GameError};
use crate::game::GameRequest;
use crate::protocol::{LoginResponse, ReloadResponse};
use crate::types::*;
use chat::ChatMessage;
use connection::Connection;
use registry::Registry;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<QuestionRepository>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(config: Config, catalog: Catalog) -> Self {
        Self {
            config,
            catalog: Arc::new(QuestionRepository::new(catalog)),
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn accounts(&self) -> &Accounts {
        &self.config.accounts
    }

    /// Open a connection for a configured account and join its chat channel
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let Some(account) = self.accounts().verify(username, password) else {
            tracing::warn!("Failed login for '{}'", username);
            return Err(ApiError::Unauthorized);
        };

        let conn = self
            .registry
            .create(&account.username, &account.channel)
            .await
            .ok_or_else(|| ApiError::Conflict(format!("{} is already logged in", username)))?;

        self.registry.join_channel(&conn).await;
        let token = self.registry.issue_token(&conn).await;
        tracing::info!("{} logged in, listening to #{}", conn.id(), conn.channel());

        Ok(LoginResponse {
            username: conn.id().to_string(),
            channel: conn.channel().to_string(),
            token,
        })
    }

    pub async fn logout(&self, conn: &Arc<Connection>) -> bool {
        tracing::info!("{} logged out", conn.id());
        self.registry.close(conn).await
    }

    /// The connection behind a bearer token, marked as active
    pub async fn authenticate(&self, token: &str) -> Option<Arc<Connection>> {
        let conn = self.registry.by_token(token).await?;
        conn.touch();
        Some(conn)
    }

    /// Start a game on the current catalog snapshot
    pub async fn start_game(
        &self,
        conn: &Connection,
        request: &GameRequest,
    ) -> Result<RoundView, GameError> {
        let catalog = self.catalog.snapshot().await;
        conn.start_game(&catalog, request).await
    }

    pub async fn categories(&self) -> Vec<CategoryGroupDefinition> {
        self.catalog
            .snapshot()
            .await
            .definitions(self.config.show_dev_groups)
    }

    pub async fn media(&self, id: &str) -> Option<Arc<[u8]>> {
        self.catalog.snapshot().await.media(id)
    }

    pub fn check_admin_password(&self, password: &str) -> bool {
        match &self.config.admin_password {
            Some(expected) => {
                crate::auth::constant_time_eq(expected.as_bytes(), password.as_bytes())
            }
            None => false,
        }
    }

    /// Reload the catalog from its source and refresh the export mirror.
    /// Running games keep the catalog they started with.
    pub async fn reload_catalog(&self) -> Result<ReloadResponse, CatalogError> {
        let catalog = self
            .catalog
            .reload_from_path(&self.config.catalog_path)
            .await
            .inspect_err(|e| tracing::error!("Catalog reload failed: {}", e))?;

        let exported = self.export_catalog(&catalog).await;
        let CatalogStats {
            categories,
            questions,
            ..
        } = catalog.stats();

        Ok(ReloadResponse {
            categories,
            questions,
            exported,
        })
    }

    pub async fn export_catalog(&self, catalog: &Catalog) -> usize {
        match &self.config.export_dir {
            Some(dir) => export_categories(catalog, dir).await,
            None => 0,
        }
    }

    /// Entry point for chat bridges
    pub async fn dispatch_chat(&self, msg: ChatMessage) -> bool {
        self.registry.dispatch_chat(msg).await
    }
}

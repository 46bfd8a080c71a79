//! Question catalog
//!
//! The catalog is immutable once built. [`QuestionRepository`] hands out
//! `Arc` snapshots and swaps the whole catalog on reload, so readers never
//! observe a partially updated catalog and running games keep drawing from
//! the snapshot they started with.

pub mod export;
pub mod import;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CatalogError, GameError};
use crate::types::*;

/// Content-addressed image bytes (SHA-256 hex -> bytes)
pub type MediaCache = HashMap<MediaId, Arc<[u8]>>;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: Vec<CategoryGroup>,
    media: MediaCache,
}

/// Totals logged after every load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub groups: usize,
    pub categories: usize,
    pub questions: usize,
    pub correct_answers: usize,
    pub wrong_answers: usize,
}

impl CatalogStats {
    pub fn correct_ratio(&self) -> f64 {
        let total = self.correct_answers + self.wrong_answers;
        if total == 0 {
            return 0.0;
        }
        self.correct_answers as f64 / total as f64
    }
}

impl Catalog {
    /// Build a catalog, dropping categories without questions.
    /// Fails when nothing usable is left.
    pub fn new(groups: Vec<CategoryGroup>, media: MediaCache) -> Result<Self, CatalogError> {
        let groups: Vec<CategoryGroup> = groups
            .into_iter()
            .map(|mut group| {
                group.categories.retain(|c| !c.pool.is_empty());
                group
            })
            .collect();

        if groups.iter().all(|g| g.categories.is_empty()) {
            return Err(CatalogError::Empty);
        }

        Ok(Self { groups, media })
    }

    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    pub fn lookup_group(&self, id: &str) -> Result<&CategoryGroup, GameError> {
        self.groups
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| GameError::UnknownGroup(id.to_string()))
    }

    pub fn lookup_category(&self, id: &str) -> Result<&Category, GameError> {
        self.find_category(id)
            .map(|(_, category)| category)
            .ok_or_else(|| GameError::UnknownCategory(id.to_string()))
    }

    /// The group a category belongs to
    pub fn group_of(&self, category_id: &str) -> Option<&CategoryGroup> {
        self.find_category(category_id).map(|(group, _)| group)
    }

    fn find_category(&self, id: &str) -> Option<(&CategoryGroup, &Category)> {
        self.groups.iter().find_map(|group| {
            group
                .categories
                .iter()
                .find(|c| c.id == id)
                .map(|category| (group, category))
        })
    }

    /// Listing for callers. Development-only groups are hidden unless
    /// `show_dev` is set.
    pub fn definitions(&self, show_dev: bool) -> Vec<CategoryGroupDefinition> {
        self.groups
            .iter()
            .filter(|g| !g.categories.is_empty())
            .filter(|g| g.is_release || (show_dev && g.is_dev))
            .map(CategoryGroup::definition)
            .collect()
    }

    pub fn media(&self, id: &str) -> Option<Arc<[u8]>> {
        self.media.get(id).cloned()
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            groups: self.groups.len(),
            ..Default::default()
        };
        for category in self.groups.iter().flat_map(|g| &g.categories) {
            stats.categories += 1;
            stats.questions += category.pool.len();
            for question in &category.pool {
                stats.correct_answers += question.correct().len();
                stats.wrong_answers += question.wrong().len();
            }
        }
        stats
    }
}

/// Shared handle to the current catalog
#[derive(Debug, Default)]
pub struct QuestionRepository {
    current: RwLock<Arc<Catalog>>,
}

impl QuestionRepository {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Consistent view of the catalog for the caller's whole operation
    pub async fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().await.clone()
    }

    pub async fn lookup_category(&self, id: &str) -> Result<Category, GameError> {
        self.snapshot().await.lookup_category(id).cloned()
    }

    pub async fn lookup_group(&self, id: &str) -> Result<CategoryGroup, GameError> {
        self.snapshot().await.lookup_group(id).cloned()
    }

    /// Swap in a new catalog. On error the previous catalog stays active.
    pub async fn replace(
        &self,
        groups: Vec<CategoryGroup>,
        media: MediaCache,
    ) -> Result<Arc<Catalog>, CatalogError> {
        let catalog = Arc::new(Catalog::new(groups, media)?);
        *self.current.write().await = catalog.clone();

        let stats = catalog.stats();
        tracing::info!(
            "Got {} quiz categories with a total of {} questions and {} correct and {} wrong answers ({:.3}% correct)",
            stats.categories,
            stats.questions,
            stats.correct_answers,
            stats.wrong_answers,
            stats.correct_ratio() * 100.0
        );
        Ok(catalog)
    }

    /// Parse a catalog file and swap it in
    pub async fn reload_from_path(&self, path: &Path) -> Result<Arc<Catalog>, CatalogError> {
        tracing::info!("Loading quiz catalog from {}", path.display());
        let raw = tokio::fs::read_to_string(path).await?;
        let (groups, media) = import::parse_catalog(&raw)?;
        self.replace(groups, media).await
    }
}

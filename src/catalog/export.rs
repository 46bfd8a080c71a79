//! Human-readable mirror of the catalog, one JSON file per category

use std::path::{Path, PathBuf};

use super::Catalog;
use crate::types::Category;

/// File name for a category record. Anything outside `[A-Za-z0-9_-]` is
/// replaced so ids can't escape the export directory.
pub fn record_path(dir: &Path, category: &Category) -> PathBuf {
    let name: String = category
        .id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{}.json", name))
}

/// Write every category of the catalog into `dir`.
/// Failures are logged per category; returns the number of files written.
pub async fn export_categories(catalog: &Catalog, dir: &Path) -> usize {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::error!("Error creating export directory {}: {}", dir.display(), e);
        return 0;
    }

    let mut written = 0;
    for category in catalog.groups().iter().flat_map(|g| &g.categories) {
        let data = match serde_json::to_vec_pretty(category) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Error marshaling category '{}': {}", category.title, e);
                continue;
            }
        };

        let path = record_path(dir, category);
        match tokio::fs::write(&path, data).await {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::error!(
                    "Error writing json file of category '{}': {}",
                    category.title,
                    e
                );
            }
        }
    }

    tracing::debug!("Exported {} categories to {}", written, dir.display());
    written
}

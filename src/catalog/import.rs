//! Catalog ingestion from the JSON source document
//!
//! Invalid questions are logged and skipped, they never enter a pool.
//! Image media arrives base64-encoded and is stored content-addressed.

use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::MediaCache;
use crate::error::CatalogError;
use crate::types::*;

#[derive(Debug, Deserialize)]
pub struct CatalogSource {
    #[serde(default)]
    pub groups: Vec<GroupSource>,
}

#[derive(Debug, Deserialize)]
pub struct GroupSource {
    pub id: GroupId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_dev: bool,
    #[serde(default)]
    pub is_release: bool,
    #[serde(default)]
    pub categories: Vec<CategorySource>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySource {
    pub id: CategoryId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<QuestionSource>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionSource {
    #[serde(default)]
    pub question: ContentSource,
    #[serde(default)]
    pub correct: Vec<ContentSource>,
    #[serde(default)]
    pub wrong: Vec<ContentSource>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentSource {
    #[serde(rename = "type", default)]
    pub kind: ContentKind,
    #[serde(default)]
    pub text: String,
    /// Base64 image bytes
    #[serde(default)]
    pub media: Option<String>,
}

/// Parse a catalog document into groups plus their media cache
pub fn parse_catalog(raw: &str) -> Result<(Vec<CategoryGroup>, MediaCache), CatalogError> {
    let source: CatalogSource = serde_json::from_str(raw)?;
    tracing::info!("Parsing {} category groups", source.groups.len());

    let mut media = MediaCache::new();
    let groups = source
        .groups
        .into_iter()
        .map(|group| convert_group(group, &mut media))
        .collect();

    Ok((groups, media))
}

fn convert_group(source: GroupSource, media: &mut MediaCache) -> CategoryGroup {
    let categories = source
        .categories
        .into_iter()
        .map(|category| convert_category(category, media))
        .filter(|category| !category.pool.is_empty())
        .collect();

    CategoryGroup {
        title: if source.title.is_empty() {
            source.id.clone()
        } else {
            source.title
        },
        id: source.id,
        is_dev: source.is_dev,
        is_release: source.is_release,
        categories,
    }
}

fn convert_category(source: CategorySource, media: &mut MediaCache) -> Category {
    let mut pool = Vec::with_capacity(source.questions.len());
    for (index, question) in source.questions.into_iter().enumerate() {
        match convert_question(question, media) {
            Ok(Some(q)) => pool.push(q),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Could not get question from {} row {}: {}",
                    source.id,
                    index + 1,
                    e
                );
            }
        }
    }

    Category {
        title: if source.title.is_empty() {
            source.id.clone()
        } else {
            source.title
        },
        id: source.id,
        description: source.description,
        pool,
    }
}

/// `Ok(None)` for a blank row. The question's images are added to `media`
/// only once the question is accepted.
fn convert_question(
    source: QuestionSource,
    media: &mut MediaCache,
) -> Result<Option<Question>, CatalogError> {
    let mut pending = MediaCache::new();
    let question = convert_content(source.question, &mut pending)?;
    let correct = convert_answers(source.correct, &mut pending)?;
    let wrong = convert_answers(source.wrong, &mut pending)?;

    if question.is_empty() && correct.is_empty() && wrong.is_empty() {
        return Ok(None);
    }
    let question = Question::new(question, correct, wrong)?;
    for (media_id, bytes) in pending {
        media.entry(media_id).or_insert(bytes);
    }
    Ok(Some(question))
}

fn convert_answers(
    sources: Vec<ContentSource>,
    media: &mut MediaCache,
) -> Result<Vec<DisplayableContent>, CatalogError> {
    let mut answers = Vec::with_capacity(sources.len());
    for source in sources {
        let content = convert_content(source, media)?;
        // empty cells are skipped
        if !content.is_empty() {
            answers.push(content);
        }
    }
    Ok(answers)
}

fn convert_content(
    source: ContentSource,
    media: &mut MediaCache,
) -> Result<DisplayableContent, CatalogError> {
    match (source.kind, source.media) {
        (ContentKind::Image, Some(encoded)) => {
            let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
            let media_id = hex::encode(Sha256::digest(&bytes));
            media
                .entry(media_id.clone())
                .or_insert_with(|| Arc::from(bytes));
            Ok(DisplayableContent::image(source.text, media_id))
        }
        (kind, _) => Ok(DisplayableContent {
            kind,
            text: source.text,
            media_id: None,
        }),
    }
}

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Opaque ID types
pub type GroupId = String;
pub type CategoryId = String;
pub type UserId = String;
pub type VoterId = String;
pub type ChannelName = String;
pub type MediaId = String;

/// Questions offer at most this many answers (1 correct + 3 wrong)
pub const MAX_ANSWERS: usize = 4;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Image,
}

/// Something shown to players: plain text, or an image with a caption.
///
/// Image bytes live in the catalog's media cache, keyed by `media_id`
/// (SHA-256 of the bytes). They are never part of the serialized content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayableContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<MediaId>,
}

impl DisplayableContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            text: text.into(),
            media_id: None,
        }
    }

    pub fn image(caption: impl Into<String>, media_id: MediaId) -> Self {
        Self {
            kind: ContentKind::Image,
            text: caption.into(),
            media_id: Some(media_id),
        }
    }

    /// Neither text nor media
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.media_id.is_none()
    }
}

/// A question with at least one correct and one wrong answer.
///
/// The answer sets are private so a question violating that invariant can
/// never be constructed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Question {
    question: DisplayableContent,
    correct: Vec<DisplayableContent>,
    wrong: Vec<DisplayableContent>,
}

impl Question {
    pub fn new(
        question: DisplayableContent,
        correct: Vec<DisplayableContent>,
        wrong: Vec<DisplayableContent>,
    ) -> Result<Self, CatalogError> {
        if question.is_empty() {
            return Err(CatalogError::InvalidQuestion("missing question".to_string()));
        }
        if correct.is_empty() {
            return Err(CatalogError::InvalidQuestion(
                "need at least one correct answer".to_string(),
            ));
        }
        if wrong.is_empty() {
            return Err(CatalogError::InvalidQuestion(
                "need at least one incorrect answer".to_string(),
            ));
        }
        Ok(Self {
            question,
            correct,
            wrong,
        })
    }

    pub fn question(&self) -> &DisplayableContent {
        &self.question
    }

    /// Never empty
    pub fn correct(&self) -> &[DisplayableContent] {
        &self.correct
    }

    /// Never empty
    pub fn wrong(&self) -> &[DisplayableContent] {
        &self.wrong
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub description: String,
    pub pool: Vec<Question>,
}

impl Category {
    pub fn definition(&self) -> CategoryDefinition {
        CategoryDefinition {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            count: self.pool.len(),
        }
    }

    pub fn reference(&self) -> CategoryRef {
        CategoryRef {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryGroup {
    pub id: GroupId,
    pub title: String,
    /// Visible in development listings
    pub is_dev: bool,
    /// Visible in release listings
    pub is_release: bool,
    pub categories: Vec<Category>,
}

impl CategoryGroup {
    pub fn definition(&self) -> CategoryGroupDefinition {
        CategoryGroupDefinition {
            id: self.id.clone(),
            title: self.title.clone(),
            categories: self.categories.iter().map(Category::definition).collect(),
        }
    }

    pub fn reference(&self) -> GroupRef {
        GroupRef {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// Category listing entry (no question content)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryDefinition {
    pub id: CategoryId,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryGroupDefinition {
    pub id: GroupId,
    pub title: String,
    pub categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRef {
    pub id: GroupId,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub title: String,
}

/// One drawn question with its shuffled answers.
///
/// `correct` is the 1-based index into `answers`. It is only sent to callers
/// inside a round summary, after the round was resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Round {
    pub question: DisplayableContent,
    pub answers: Vec<DisplayableContent>,
    pub correct: usize,
    pub current_round: usize,
    pub max_round: usize,
    pub group: GroupRef,
    pub category: CategoryRef,
}

impl Round {
    pub fn correct_answer(&self) -> Option<&DisplayableContent> {
        self.answers.get(self.correct.checked_sub(1)?)
    }

    /// The round as served while it is open
    pub fn view(&self) -> RoundView {
        RoundView {
            question: self.question.clone(),
            answers: self.answers.clone(),
            current_round: self.current_round,
            max_round: self.max_round,
            group: self.group.clone(),
            category: self.category.clone(),
        }
    }
}

/// An open round without its correct answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundView {
    pub question: DisplayableContent,
    pub answers: Vec<DisplayableContent>,
    pub current_round: usize,
    pub max_round: usize,
    pub group: GroupRef,
    pub category: CategoryRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_requires_both_answer_sets() {
        let prompt = DisplayableContent::text("2 + 2?");

        let result = Question::new(prompt.clone(), vec![], vec![DisplayableContent::text("5")]);
        assert!(matches!(result, Err(CatalogError::InvalidQuestion(_))));

        let result = Question::new(prompt.clone(), vec![DisplayableContent::text("4")], vec![]);
        assert!(matches!(result, Err(CatalogError::InvalidQuestion(_))));

        let result = Question::new(
            DisplayableContent::default(),
            vec![DisplayableContent::text("4")],
            vec![DisplayableContent::text("5")],
        );
        assert!(matches!(result, Err(CatalogError::InvalidQuestion(_))));

        let question = Question::new(
            prompt,
            vec![DisplayableContent::text("4")],
            vec![DisplayableContent::text("5")],
        )
        .unwrap();
        assert_eq!(question.correct().len(), 1);
        assert_eq!(question.wrong().len(), 1);
    }

    #[test]
    fn test_round_view_hides_correct_index() {
        let round = Round {
            question: DisplayableContent::text("Capital of France?"),
            answers: vec![
                DisplayableContent::text("Berlin"),
                DisplayableContent::text("Paris"),
            ],
            correct: 2,
            current_round: 1,
            max_round: 3,
            group: GroupRef::default(),
            category: CategoryRef::default(),
        };

        let json = serde_json::to_value(round.view()).unwrap();
        assert!(json.get("correct").is_none());
        assert_eq!(json["current_round"], 1);
        assert_eq!(json["max_round"], 3);
        assert_eq!(round.correct_answer().unwrap().text, "Paris");
    }

    #[test]
    fn test_image_content_serializes_without_bytes() {
        let content = DisplayableContent::image("a cat", "abc123".to_string());
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["text"], "a cat");
        assert_eq!(json["media_id"], "abc123");
    }
}

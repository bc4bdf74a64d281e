use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// Longest source text accepted by the write path.
pub const MAX_CARD_TEXT_LENGTH: usize = 5000;

/// A single learning unit belonging to one deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub deck_id: String,
    pub original_text: String,
    /// Source text annotated with its reading (e.g. furigana).
    pub furigana_text: String,
    pub translated_text: String,
    pub language: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Structured analysis blob produced by the text analysis service.
    #[serde(default)]
    pub analysis: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn validate(&self) -> Result<()> {
        validate_text(&self.original_text)
    }
}

/// Input for creating a card. `image` is a local file that gets uploaded.
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub deck_id: String,
    pub original_text: String,
    pub furigana_text: String,
    pub translated_text: String,
    pub language: String,
    pub image: Option<PathBuf>,
    pub analysis: Option<JsonValue>,
}

impl NewCard {
    pub fn validate(&self) -> Result<()> {
        if self.deck_id.trim().is_empty() {
            return Err(Error::Validation("Card must belong to a deck".to_string()));
        }
        validate_text(&self.original_text)
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::Validation("Card text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_CARD_TEXT_LENGTH {
        return Err(Error::Validation(format!(
            "Card text is longer than {} characters",
            MAX_CARD_TEXT_LENGTH
        )));
    }
    Ok(())
}

//! Row shapes exchanged with the remote gateway and their conversion into
//! local entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::{Card, Deck};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order_index: Option<i64>,
}

impl From<DeckRecord> for Deck {
    fn from(record: DeckRecord) -> Self {
        Deck {
            updated_at: record.updated_at.unwrap_or(record.created_at),
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            order_index: record.order_index.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: String,
    pub deck_id: String,
    pub original_text: String,
    #[serde(default)]
    pub furigana_text: Option<String>,
    #[serde(default)]
    pub translated_text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, rename = "analysis_data")]
    pub analysis: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl From<CardRecord> for Card {
    fn from(record: CardRecord) -> Self {
        Card {
            id: record.id,
            deck_id: record.deck_id,
            original_text: record.original_text,
            furigana_text: record.furigana_text.unwrap_or_default(),
            translated_text: record.translated_text.unwrap_or_default(),
            language: record.language.unwrap_or_default(),
            image_url: record.image_url.filter(|url| !url.is_empty()),
            analysis: record.analysis.filter(|v| !v.is_null()),
            created_at: record.created_at,
        }
    }
}

/// Body for creating a deck.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckDraft {
    pub name: String,
    pub order_index: i64,
}

/// Body for creating a card; `image_url` is already uploaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardDraft {
    pub deck_id: String,
    pub original_text: String,
    pub furigana_text: String,
    pub translated_text: String,
    pub language: String,
    pub image_url: Option<String>,
    #[serde(rename = "analysis_data")]
    pub analysis: Option<JsonValue>,
}

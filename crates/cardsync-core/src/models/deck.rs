use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest deck name accepted by the write path.
pub const MAX_DECK_NAME_LENGTH: usize = 100;

/// A named collection of cards owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Unique per owner, not necessarily contiguous.
    pub order_index: i64,
}

impl Deck {
    /// Trim and check a proposed deck name.
    pub fn validate_name(name: &str) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("Deck name cannot be empty".to_string()));
        }
        if trimmed.chars().count() > MAX_DECK_NAME_LENGTH {
            return Err(Error::Validation(format!(
                "Deck name is longer than {} characters",
                MAX_DECK_NAME_LENGTH
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(Error::Validation(
                "Deck name cannot contain control characters".to_string(),
            ));
        }
        Ok(trimmed.to_string())
    }
}

/// Partial update for a deck: rename and/or reorder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeckChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
}

impl DeckChanges {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            order_index: None,
        }
    }

    pub fn reorder(order_index: i64) -> Self {
        Self {
            name: None,
            order_index: Some(order_index),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.order_index.is_none()
    }
}

/// Ordering key for a new deck placed after every existing one.
pub fn next_order_index(decks: &[Deck]) -> i64 {
    decks
        .iter()
        .map(|d| d.order_index)
        .max()
        .map(|max| max + 1)
        .unwrap_or(0)
}

/// Target ordering keys when `ordered_ids` move to the front: listed decks
/// take `0..n` in the given order, every other deck follows in its current
/// order. Keys stay unique across all of `decks`.
pub fn reordered_keys(decks: &[Deck], ordered_ids: &[String]) -> Vec<(String, i64)> {
    let mut rest: Vec<&Deck> = decks
        .iter()
        .filter(|d| !ordered_ids.contains(&d.id))
        .collect();
    rest.sort_by_key(|d| d.order_index);

    ordered_ids
        .iter()
        .cloned()
        .chain(rest.into_iter().map(|d| d.id.clone()))
        .zip(0..)
        .collect()
}

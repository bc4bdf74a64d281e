//! Domain models for decks (partitions) and cards (items).
//!
//! These are the local entity shapes stored in the cache. Remote row
//! shapes live in [`crate::remote::records`] and convert into these.

pub mod card;
pub mod deck;

pub use card::{Card, NewCard, MAX_CARD_TEXT_LENGTH};
pub use deck::{next_order_index, reordered_keys, Deck, DeckChanges, MAX_DECK_NAME_LENGTH};

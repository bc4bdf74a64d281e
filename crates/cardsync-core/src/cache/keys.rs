//! Storage keys, namespaced as `<kind>_<owner>_<scope>`.
//!
//! `_` and `%` inside IDs are escaped so that two different
//! (owner, scope) pairs can never produce the same key.

fn part(id: &str) -> String {
    id.replace('%', "%25").replace('_', "%5F")
}

pub fn cards_key(owner: &str, deck_id: &str) -> String {
    format!("cards_{}_{}", part(owner), part(deck_id))
}

pub fn decks_key(owner: &str) -> String {
    format!("decks_{}_all", part(owner))
}

pub fn meta_key(owner: &str) -> String {
    format!("meta_{}_cache", part(owner))
}

pub fn assets_key(owner: &str) -> String {
    format!("assets_{}_map", part(owner))
}

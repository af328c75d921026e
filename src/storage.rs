use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Failure surfaced by the key-value collaborator. Propagated upward
/// unmodified; the engine performs no retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageError {
    pub detail: String,
}

impl StorageError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// The key-value store every record lives in: game snapshots, card
/// definitions, decks and profiles, each under its own key namespace.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&mut self, key: &str) -> Result<(), StorageError>;
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Key namespace conventions shared by the orchestrator and its host.
pub mod keys {
    pub fn game(id: &str) -> String {
        format!("game:{id}")
    }

    pub fn card(id: &str) -> String {
        format!("card:{id}")
    }

    pub fn deck(player_id: &str, deck_id: &str) -> String {
        format!("{player_id}/{deck_id}")
    }

    pub fn profile(player_id: &str) -> String {
        format!("profile:{player_id}")
    }
}

/// In-memory store used by tests and the wasm host, which hands records in
/// from the outside.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.records.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StorageError> {
        self.records.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_delete() {
        let mut store = MemoryStore::new();
        store.put("game:1", "{}").unwrap();
        assert_eq!(store.get("game:1").unwrap().as_deref(), Some("{}"));
        store.delete("game:1").unwrap();
        assert_eq!(store.get("game:1").unwrap(), None);
    }

    #[test]
    fn list_respects_the_prefix() {
        let mut store = MemoryStore::new();
        store.put("card:a", "1").unwrap();
        store.put("card:b", "2").unwrap();
        store.put("game:1", "3").unwrap();
        assert_eq!(store.list("card:").unwrap(), vec!["card:a", "card:b"]);
        assert!(store.list("profile:").unwrap().is_empty());
    }

    #[test]
    fn key_namespaces_stay_distinct() {
        assert_eq!(keys::game("g1"), "game:g1");
        assert_eq!(keys::card("c1"), "card:c1");
        assert_eq!(keys::deck("alice", "d1"), "alice/d1");
        assert_eq!(keys::profile("alice"), "profile:alice");
    }
}

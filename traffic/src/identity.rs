//! Opaque per-participant correlation ids.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::{Builder, Uuid};

/// Bidirectional participant-name ↔ opaque-id map, stored as id → name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityMap {
    by_id: BTreeMap<String, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `participant`, replacing any previous id of that participant.
    pub fn bind(&mut self, id: impl Into<String>, participant: impl Into<String>) {
        let participant = participant.into();
        self.by_id.retain(|_, name| *name != participant);
        self.by_id.insert(id.into(), participant);
    }

    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn id_for(&self, participant: &str) -> Option<&str> {
        self.by_id
            .iter()
            .find(|(_, name)| name.as_str() == participant)
            .map(|(id, _)| id.as_str())
    }

    /// Propagate a participant rename; the id stays the same.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let mut renamed = false;
        for name in self.by_id.values_mut().filter(|n| n.as_str() == old) {
            *name = new.to_string();
            renamed = true;
        }
        renamed
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_id.iter().map(|(id, name)| (id.as_str(), name.as_str()))
    }
}

/// Source of fresh ids. `None` means the source is unavailable.
pub trait IdSource {
    fn mint(&mut self, participant: &str) -> Option<String>;
}

/// Random v4 uuids from the operating system's secure source.
#[derive(Debug, Default)]
pub struct SecureIdSource;

impl IdSource for SecureIdSource {
    fn mint(&mut self, _participant: &str) -> Option<String> {
        let mut bytes = [0u8; 16];
        OsRng.try_fill_bytes(&mut bytes).ok()?;
        Some(Builder::from_random_bytes(bytes).into_uuid().to_string())
    }
}

/// Deterministic uuid-shaped ids derived from the participant name and a
/// running counter.
#[derive(Debug, Default)]
pub struct PatternIdSource {
    counter: u64,
}

impl IdSource for PatternIdSource {
    fn mint(&mut self, participant: &str) -> Option<String> {
        self.counter += 1;
        let hash = blake3::hash(format!("{}:{}", participant, self.counter).as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Some(Builder::from_random_bytes(bytes).into_uuid().to_string())
    }
}

/// Mints ids for participants that do not have one yet
pub struct IdentityAssigner<S: IdSource = SecureIdSource> {
    source: S,
    fallback: PatternIdSource,
}

impl IdentityAssigner<SecureIdSource> {
    pub fn new() -> Self {
        Self::with_source(SecureIdSource)
    }
}

impl Default for IdentityAssigner<SecureIdSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: IdSource> IdentityAssigner<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            fallback: PatternIdSource::default(),
        }
    }

    /// Keep existing ids of current participants and mint the rest.
    pub fn assign(&mut self, participants: &[String], existing: Option<&IdentityMap>) -> IdentityMap {
        let mut map = IdentityMap::new();
        if let Some(existing) = existing {
            for (id, name) in existing.iter() {
                if participants.iter().any(|p| p == name) {
                    map.bind(id, name);
                }
            }
        }

        let mut minted = 0usize;
        for participant in participants {
            if map.id_for(participant).is_some() {
                continue;
            }
            let id = self.mint_unique(participant, &map);
            map.bind(id, participant.clone());
            minted += 1;
        }

        debug!(minted, total = map.len(), "Participant ids assigned");
        map
    }

    fn mint_unique(&mut self, participant: &str, map: &IdentityMap) -> String {
        if let Some(id) = self.source.mint(participant) {
            if map.name_for(&id).is_none() {
                return id;
            }
        } else {
            warn!(participant, "Secure id source unavailable, using pattern ids");
        }
        loop {
            let id = self
                .fallback
                .mint(participant)
                .unwrap_or_else(|| Uuid::nil().to_string());
            if map.name_for(&id).is_none() {
                return id;
            }
        }
    }
}

//! Integrity checksum over the canonical exercise fields.
//!
//! Display/integrity only: a blake3 hash over a JSON rendering whose maps are
//! all ordered, so the same exercise always hashes the same.

use crate::exercise::Exercise;
use crate::identity::IdentityMap;
use crate::model::MessageStreams;
use crate::quota::QuotaConfig;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// The subset of an exercise covered by the checksum
#[derive(Serialize)]
struct ChecksumInput<'a> {
    date: Option<&'a NaiveDate>,
    name: &'a str,
    call_group: Option<&'a str>,
    lead: Option<&'a str>,
    quotas: &'a QuotaConfig,
    solution_words: &'a BTreeMap<String, String>,
    participants: &'a [String],
    station_names: &'a BTreeMap<String, String>,
    identities: &'a IdentityMap,
    messages: &'a MessageStreams,
}

/// Compute the checksum of an exercise as a hex string.
pub fn compute(exercise: &Exercise) -> String {
    let config = &exercise.config;
    let input = ChecksumInput {
        date: config.date.as_ref(),
        name: &config.name,
        call_group: config.call_group.as_deref(),
        lead: config.lead.as_deref(),
        quotas: &config.quotas,
        solution_words: &exercise.solution_words,
        participants: &config.participants,
        station_names: &config.station_names,
        identities: &exercise.identities,
        messages: &exercise.messages,
    };
    // Serializing plain structs and string-keyed maps cannot fail
    let canonical = serde_json::to_vec(&input).unwrap_or_default();
    blake3::hash(&canonical).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExerciseConfig;
    use crate::model::{Message, MessageKind, Recipients};

    fn exercise() -> Exercise {
        let config = ExerciseConfig::new("Übung", vec!["A".into(), "B".into()]);
        let mut exercise = Exercise::empty(config);
        exercise.messages.insert(
            "A".into(),
            vec![Message::new(1, MessageKind::Individual, Recipients::single("B"), "Hallo")],
        );
        exercise
    }

    #[test]
    fn test_checksum_is_stable() {
        let a = exercise();
        let b = exercise();
        assert_eq!(compute(&a), compute(&b));
        assert_eq!(compute(&a).len(), 64);
    }

    #[test]
    fn test_checksum_tracks_message_text() {
        let a = exercise();
        let mut b = exercise();
        if let Some(msg) = b.messages.get_mut("A").and_then(|s| s.first_mut()) {
            msg.text.push_str(" 1X");
        }
        assert_ne!(compute(&a), compute(&b));
    }

    #[test]
    fn test_checksum_tracks_metadata() {
        let a = exercise();
        let mut b = exercise();
        b.config.call_group = Some("7".into());
        assert_ne!(compute(&a), compute(&b));
    }
}

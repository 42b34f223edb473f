//! Debriefing statistics per participant.

use crate::exercise::Exercise;
use crate::model::MessageKind;
use crate::templates::is_dictation_worthy;
use serde::{Deserialize, Serialize};

/// Counts for one participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub participant: String,
    pub sent: usize,
    pub registration: usize,
    pub broadcast: usize,
    pub group: usize,
    pub individual: usize,
    /// Messages whose effective recipients include this participant
    pub received: usize,
    /// Dictation-worthy messages sent, registration excluded
    pub dictation: usize,
    /// Letter tokens on messages addressed to this participant
    pub letters: usize,
    /// Synthesized strength phrases on messages addressed to this participant
    pub synthesized_strength: usize,
    /// `L/A/H/T`
    pub strength: String,
}

/// Exercise-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseStats {
    pub participants: Vec<ParticipantStats>,
    pub total_messages: usize,
    pub shuffle_attempts: u32,
    pub adjacency_satisfied: bool,
    pub dictation_replaced: usize,
}

impl ExerciseStats {
    pub fn collect(exercise: &Exercise) -> Self {
        let participants = exercise
            .participants()
            .iter()
            .map(|p| participant_stats(exercise, p))
            .collect();

        Self {
            participants,
            total_messages: exercise.total_messages(),
            shuffle_attempts: exercise.shuffle.attempts,
            adjacency_satisfied: exercise.shuffle.satisfied,
            dictation_replaced: exercise.dictation.replaced,
        }
    }

    pub fn get(&self, participant: &str) -> Option<&ParticipantStats> {
        self.participants
            .iter()
            .find(|s| s.participant == participant)
    }
}

fn participant_stats(exercise: &Exercise, participant: &str) -> ParticipantStats {
    let mut stats = ParticipantStats {
        participant: participant.to_string(),
        strength: exercise
            .strength_summary
            .get(participant)
            .cloned()
            .unwrap_or_else(|| "0/0/0/0".to_string()),
        ..Default::default()
    };

    for message in exercise.messages.get(participant).into_iter().flatten() {
        stats.sent += 1;
        match message.kind {
            MessageKind::Registration => stats.registration += 1,
            MessageKind::Broadcast => stats.broadcast += 1,
            MessageKind::Group => stats.group += 1,
            MessageKind::Individual => stats.individual += 1,
        }
        if !message.is_registration() && is_dictation_worthy(&message.text) {
            stats.dictation += 1;
        }
    }

    for handle in exercise.inbox(participant) {
        let Some(message) = exercise.message(&handle) else {
            continue;
        };
        stats.received += 1;
        if message.recipients.sole() == Some(participant) {
            stats.letters += message.solution_letters.len();
            if message.synthesized_strength {
                stats.synthesized_strength += 1;
            }
        }
    }

    stats
}

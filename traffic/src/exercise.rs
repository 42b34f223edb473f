//! Exercise aggregate and the one-shot generate pipeline.
//!
//! ```text
//! QuotaPlanner → DistributionEngine → SolutionLetterInjector
//!              → StrengthAggregator → IdentityAssigner → checksum
//! ```
//!
//! Every call produces a fresh message set that replaces any earlier result.
//! Calls for the same exercise must be serialized by the caller.

use crate::checksum;
use crate::config::ExerciseConfig;
use crate::distribution::{DictationReport, DistributionEngine, ShuffleOutcome};
use crate::identity::{IdSource, IdentityAssigner, IdentityMap};
use crate::letters::{self, InjectionReport, SolutionLetterInjector};
use crate::model::{Message, MessageHandle, MessageStreams};
use crate::quota::{DistributionPlan, QuotaPlanner};
use crate::strength::{StrengthAggregator, StrengthSummary};
use crate::templates::TemplatePool;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// A generated exercise: configuration plus its full message set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub config: ExerciseConfig,
    /// Participant → normalized solution word
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub solution_words: BTreeMap<String, String>,
    pub plans: BTreeMap<String, DistributionPlan>,
    /// Per-sender message streams
    pub messages: MessageStreams,
    /// Accepted global order of the shuffled messages
    pub global_order: Vec<MessageHandle>,
    pub shuffle: ShuffleOutcome,
    pub dictation: DictationReport,
    pub letters: InjectionReport,
    pub strength_summary: StrengthSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synthesized_strength: Vec<MessageHandle>,
    pub identities: IdentityMap,
    pub checksum: String,
    pub generated_at: DateTime<Utc>,
}

impl Exercise {
    /// An exercise with no generated traffic yet
    pub fn empty(config: ExerciseConfig) -> Self {
        Self {
            config,
            solution_words: BTreeMap::new(),
            plans: BTreeMap::new(),
            messages: MessageStreams::new(),
            global_order: Vec::new(),
            shuffle: ShuffleOutcome::default(),
            dictation: DictationReport::default(),
            letters: InjectionReport::default(),
            strength_summary: StrengthSummary::new(),
            synthesized_strength: Vec::new(),
            identities: IdentityMap::new(),
            checksum: String::new(),
            generated_at: Utc::now(),
        }
    }

    /// Generate the full message set with secure participant ids.
    pub fn generate<R: Rng + ?Sized>(
        config: &ExerciseConfig,
        pool: &TemplatePool,
        existing_ids: Option<&IdentityMap>,
        rng: &mut R,
    ) -> Self {
        Self::generate_with(config, pool, &mut IdentityAssigner::new(), existing_ids, rng)
    }

    /// Generate with a caller-supplied id assigner.
    pub fn generate_with<S: IdSource, R: Rng + ?Sized>(
        config: &ExerciseConfig,
        pool: &TemplatePool,
        assigner: &mut IdentityAssigner<S>,
        existing_ids: Option<&IdentityMap>,
        rng: &mut R,
    ) -> Self {
        let participants = &config.participants;
        let quotas = &config.quotas;
        info!(
            exercise = %config.name,
            participants = participants.len(),
            templates = pool.len(),
            "Generating exercise traffic"
        );

        let plans = QuotaPlanner::new(quotas).plan_all(participants);

        let mut engine = DistributionEngine::new(participants, pool)
            .with_dictation_minimum(quotas.dictation_minimum);
        if quotas.registration_enabled {
            engine =
                engine.with_registration(config.lead.as_deref(), config.call_group.as_deref());
        }
        let distribution = engine.distribute(&plans, rng);
        let mut messages = distribution.streams;

        let solution_words = config.solution_words.assign(participants);
        let letters =
            SolutionLetterInjector::new(participants).inject(&mut messages, &solution_words, rng);

        let strength = StrengthAggregator::new(participants)
            .with_auto_completion(quotas.auto_strength_completion)
            .run(&mut messages, rng);

        let identities = assigner.assign(participants, existing_ids);

        let mut exercise = Self {
            config: config.clone(),
            solution_words,
            plans,
            messages,
            global_order: distribution.global_order,
            shuffle: distribution.shuffle,
            dictation: distribution.dictation,
            letters,
            strength_summary: strength.summary,
            synthesized_strength: strength.synthesized,
            identities,
            checksum: String::new(),
            generated_at: Utc::now(),
        };
        exercise.checksum = checksum::compute(&exercise);

        info!(
            messages = exercise.total_messages(),
            checksum = %exercise.checksum,
            "Exercise generated"
        );
        exercise
    }

    pub fn participants(&self) -> &[String] {
        &self.config.participants
    }

    pub fn total_messages(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    pub fn message(&self, handle: &MessageHandle) -> Option<&Message> {
        handle.resolve(&self.messages)
    }

    /// Messages whose effective recipients include `participant`, by sender
    /// then sequence id.
    pub fn inbox(&self, participant: &str) -> Vec<MessageHandle> {
        self.messages
            .iter()
            .flat_map(|(sender, stream)| {
                stream
                    .iter()
                    .filter(move |m| {
                        m.recipients
                            .effective(sender, self.participants())
                            .contains(&participant)
                    })
                    .map(move |m| MessageHandle::new(sender.clone(), m.sequence_id))
            })
            .collect()
    }

    /// Call-sign display name, falling back to the participant name
    pub fn station_name<'a>(&'a self, participant: &'a str) -> &'a str {
        self.config
            .station_names
            .get(participant)
            .map(String::as_str)
            .unwrap_or(participant)
    }

    /// Solution word as reassembled from the tokens addressed to `participant`
    pub fn reconstruct_word(&self, participant: &str) -> String {
        letters::reconstruct_word(&self.messages, participant)
    }

    /// Recompute the checksum and compare with the stored one
    pub fn verify_checksum(&self) -> bool {
        checksum::compute(self) == self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::letters::SolutionWordConfig;
    use crate::model::{MessageKind, Recipients};
    use crate::quota::QuotaShare;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ExerciseConfig {
        let mut config = ExerciseConfig::new(
            "Übung",
            vec!["A".into(), "B".into(), "C".into(), "D".into()],
        );
        config.quotas.messages_per_participant = 6;
        config.quotas.broadcast = QuotaShare::Count(1);
        config.quotas.group = QuotaShare::Count(1);
        config.quotas.registration_enabled = true;
        config.lead = Some("A".into());
        config.solution_words = SolutionWordConfig::Central { word: "Lot".into() };
        config.station_names.insert("A".into(), "Leitstelle".into());
        config
    }

    fn pool() -> TemplatePool {
        TemplatePool::new(["Lage unverändert", "Bitte KONTAKTAUFNAHME", "Stärke 1/2/3/6"])
    }

    #[test]
    fn test_generate_fills_every_stream() {
        let mut rng = StdRng::seed_from_u64(12);
        let exercise = Exercise::generate(&config(), &pool(), None, &mut rng);

        assert_eq!(exercise.total_messages(), 4 * 6);
        assert!(exercise.messages.values().all(|s| s.len() == 6));
        assert_eq!(exercise.identities.len(), 4);
        assert_eq!(exercise.strength_summary.len(), 4);
        assert!(exercise.verify_checksum());
    }

    #[test]
    fn test_lead_registers_to_everyone_else() {
        let mut rng = StdRng::seed_from_u64(12);
        let exercise = Exercise::generate(&config(), &pool(), None, &mut rng);

        assert_eq!(exercise.messages["A"][0].recipients, Recipients::All);
        assert_eq!(exercise.messages["B"][0].recipients, Recipients::single("A"));
        assert_eq!(exercise.messages["B"][0].kind, MessageKind::Registration);
    }

    #[test]
    fn test_inbox_expands_broadcasts() {
        let mut rng = StdRng::seed_from_u64(3);
        let exercise = Exercise::generate(&config(), &pool(), None, &mut rng);

        for participant in exercise.participants() {
            for handle in exercise.inbox(participant) {
                assert_ne!(&handle.sender, participant);
                assert!(exercise.message(&handle).is_some());
            }
        }
        // every broadcast from B reaches C
        let broadcasts_from_b = exercise.messages["B"]
            .iter()
            .filter(|m| m.recipients == Recipients::All)
            .count();
        let from_b_in_c = exercise
            .inbox("C")
            .iter()
            .filter(|h| h.sender == "B")
            .filter(|h| exercise.message(h).map(|m| &m.recipients) == Some(&Recipients::All))
            .count();
        assert_eq!(broadcasts_from_b, from_b_in_c);
    }

    #[test]
    fn test_existing_ids_survive_regeneration() {
        let mut rng = StdRng::seed_from_u64(1);
        let first = Exercise::generate(&config(), &pool(), None, &mut rng);
        let second = Exercise::generate(&config(), &pool(), Some(&first.identities), &mut rng);
        assert_eq!(first.identities, second.identities);
    }

    #[test]
    fn test_tampering_breaks_checksum() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut exercise = Exercise::generate(&config(), &pool(), None, &mut rng);
        if let Some(stream) = exercise.messages.get_mut("B") {
            stream[1].text.push_str(" geändert");
        }
        assert!(!exercise.verify_checksum());
    }

    #[test]
    fn test_station_name_fallback() {
        let exercise = Exercise::empty(config());
        assert_eq!(exercise.station_name("A"), "Leitstelle");
        assert_eq!(exercise.station_name("B"), "B");
    }

    #[test]
    fn test_exercise_json_round_trip_keeps_checksum() {
        let mut rng = StdRng::seed_from_u64(30);
        let exercise = Exercise::generate(&config(), &pool(), None, &mut rng);
        let json = serde_json::to_string(&exercise).unwrap();
        let restored: Exercise = serde_json::from_str(&json).unwrap();
        assert!(restored.verify_checksum());
        assert_eq!(restored.strength_summary, exercise.strength_summary);
    }
}

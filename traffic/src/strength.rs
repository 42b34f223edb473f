//! Strength aggregation — mines `leader/assistant/helper[/total]` reports
//! from message text and rolls them up per recipient.
//!
//! Two phases, never more:
//! 1. parse-and-sum over every message (parsed triples are cached on the
//!    message, so repeating this phase is idempotent);
//! 2. when auto-completion is enabled, synthesize reports for participants
//!    left at all zeros, then run phase 1 exactly once more.

use crate::model::{MessageHandle, MessageStreams, StrengthReport};
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Slash-separated strength groups: three mandatory, one optional total.
static STRENGTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,4})/(\d{1,4})/(\d{1,4})(?:/(\d{1,4}))?\b")
        .expect("STRENGTH_PATTERN regex should compile")
});

/// Prefix of synthesized strength phrases.
pub const SYNTHESIZED_PREFIX: &str = "Aktuelle Stärke:";

/// Below this many received messages a single synthesized report suffices.
const SMALL_INBOX_THRESHOLD: usize = 10;

/// Participant → `"L/A/H/T"`.
pub type StrengthSummary = BTreeMap<String, String>;

/// Parse every strength report in `text`. Matches whose groups are missing
/// or not numeric are discarded.
pub fn parse_strength_reports(text: &str) -> Vec<StrengthReport> {
    STRENGTH_PATTERN
        .captures_iter(text)
        .filter_map(|cap| {
            let group = |i: usize| cap.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
            Some(StrengthReport {
                leader: group(1)?,
                assistant: group(2)?,
                helper: group(3)?,
            })
        })
        .collect()
}

/// Summed strength for one participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthTotals {
    pub leader: u64,
    pub assistant: u64,
    pub helper: u64,
    pub total: u64,
}

impl StrengthTotals {
    pub fn add(&mut self, report: &StrengthReport) {
        self.leader += u64::from(report.leader);
        self.assistant += u64::from(report.assistant);
        self.helper += u64::from(report.helper);
        self.total += u64::from(report.total());
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl std::fmt::Display for StrengthTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.leader, self.assistant, self.helper, self.total
        )
    }
}

/// Result of a full aggregation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrengthOutcome {
    pub totals: BTreeMap<String, StrengthTotals>,
    pub summary: StrengthSummary,
    /// Messages that received a synthesized report
    pub synthesized: Vec<MessageHandle>,
}

/// Format totals as the participant → `"L/A/H/T"` map.
pub fn summarize(totals: &BTreeMap<String, StrengthTotals>) -> StrengthSummary {
    totals
        .iter()
        .map(|(p, t)| (p.clone(), t.to_string()))
        .collect()
}

/// Small random report used for auto-completion.
pub fn synthesize_report<R: Rng + ?Sized>(rng: &mut R) -> StrengthReport {
    StrengthReport {
        leader: rng.gen_range(0..=2),
        assistant: rng.gen_range(1..=4),
        helper: rng.gen_range(2..=12),
    }
}

/// Per-recipient strength roll-up
pub struct StrengthAggregator<'a> {
    participants: &'a [String],
    auto_completion: bool,
}

impl<'a> StrengthAggregator<'a> {
    pub fn new(participants: &'a [String]) -> Self {
        Self {
            participants,
            auto_completion: false,
        }
    }

    /// Synthesize reports for participants that would otherwise sum to zero
    pub fn with_auto_completion(mut self, enabled: bool) -> Self {
        self.auto_completion = enabled;
        self
    }

    /// One parse-and-sum pass. Uses cached reports where present and caches
    /// fresh parses. Unknown recipients are not credited.
    pub fn aggregate(&self, streams: &mut MessageStreams) -> BTreeMap<String, StrengthTotals> {
        let mut totals: BTreeMap<String, StrengthTotals> = self
            .participants
            .iter()
            .map(|p| (p.clone(), StrengthTotals::default()))
            .collect();

        for (sender, stream) in streams.iter_mut() {
            for message in stream.iter_mut() {
                let text = &message.text;
                let reports = message
                    .strength_reports
                    .get_or_insert_with(|| parse_strength_reports(text));
                if reports.is_empty() {
                    continue;
                }
                for recipient in message.recipients.effective(sender, self.participants) {
                    if let Some(entry) = totals.get_mut(recipient) {
                        for report in reports.iter() {
                            entry.add(report);
                        }
                    }
                }
            }
        }

        totals
    }

    /// Full run: aggregate, optionally auto-complete, and re-aggregate once.
    pub fn run<R: Rng + ?Sized>(&self, streams: &mut MessageStreams, rng: &mut R) -> StrengthOutcome {
        let mut totals = self.aggregate(streams);
        let mut synthesized = Vec::new();

        if self.auto_completion {
            for participant in self.participants {
                if totals.get(participant).is_some_and(|t| t.is_zero()) {
                    synthesized.extend(self.complete_participant(streams, participant, rng));
                }
            }
            if !synthesized.is_empty() {
                totals = self.aggregate(streams);
            }
        }

        info!(
            participants = totals.len(),
            synthesized = synthesized.len(),
            "Strength reports aggregated"
        );

        StrengthOutcome {
            summary: summarize(&totals),
            totals,
            synthesized,
        }
    }

    /// Append synthesized phrases to a random selection of the participant's
    /// received single-recipient messages that carry no parsed report.
    fn complete_participant<R: Rng + ?Sized>(
        &self,
        streams: &mut MessageStreams,
        participant: &str,
        rng: &mut R,
    ) -> Vec<MessageHandle> {
        let mut received = 0usize;
        let mut eligible = Vec::new();
        for (sender, stream) in streams.iter() {
            for message in stream {
                if message
                    .recipients
                    .effective(sender, self.participants)
                    .contains(&participant)
                {
                    received += 1;
                }
                if sender != participant
                    && !message.is_registration()
                    && message.recipients.sole() == Some(participant)
                    && !message.has_parsed_strength()
                {
                    eligible.push(MessageHandle::new(sender.clone(), message.sequence_id));
                }
            }
        }

        if eligible.is_empty() {
            debug!(participant, "No eligible messages for strength completion");
            return Vec::new();
        }

        let target = if received < SMALL_INBOX_THRESHOLD {
            1
        } else {
            // ceil(20% of eligible), at least two
            (eligible.len() * 2).div_ceil(10).max(2)
        }
        .min(eligible.len());

        let chosen: Vec<MessageHandle> = eligible.choose_multiple(rng, target).cloned().collect();
        for handle in &chosen {
            if let Some(message) = handle.resolve_mut(streams) {
                let report = synthesize_report(rng);
                message.text.push_str(&format!(" {} {}", SYNTHESIZED_PREFIX, report));
                message.strength_reports = None;
                message.synthesized_strength = true;
            }
        }

        debug!(participant, received, target, "Strength reports synthesized");
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Message, MessageKind, Recipients};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn msg(seq: u32, recipients: Recipients, text: &str) -> Message {
        let kind = if recipients == Recipients::All {
            MessageKind::Broadcast
        } else {
            MessageKind::Individual
        };
        Message::new(seq, kind, recipients, text)
    }

    #[test]
    fn test_parse_three_and_four_groups() {
        let reports = parse_strength_reports("Stärke 1/4/12/17, Nachtrag 0/2/5");
        assert_eq!(
            reports,
            vec![
                StrengthReport {
                    leader: 1,
                    assistant: 4,
                    helper: 12
                },
                StrengthReport {
                    leader: 0,
                    assistant: 2,
                    helper: 5
                },
            ]
        );
    }

    #[test]
    fn test_parse_ignores_non_patterns() {
        assert!(parse_strength_reports("Kanal 12, Lage ruhig").is_empty());
        assert!(parse_strength_reports("Datum 12/05").is_empty());
        assert!(parse_strength_reports("ABC1/2/3").is_empty());
        assert!(parse_strength_reports("1/2/34567").is_empty());
    }

    #[test]
    fn test_totals_display() {
        let mut totals = StrengthTotals::default();
        assert!(totals.is_zero());
        assert_eq!(totals.to_string(), "0/0/0/0");
        totals.add(&StrengthReport {
            leader: 1,
            assistant: 2,
            helper: 3,
        });
        assert_eq!(totals.to_string(), "1/2/3/6");
    }

    #[test]
    fn test_alle_credits_everyone_but_sender() {
        let participants = names(&["A", "B", "C"]);
        let mut streams = MessageStreams::new();
        streams.insert("A".into(), vec![msg(1, Recipients::All, "Stärke 1/2/3")]);
        streams.insert("B".into(), Vec::new());
        streams.insert("C".into(), Vec::new());

        let totals = StrengthAggregator::new(&participants).aggregate(&mut streams);
        assert_eq!(totals["A"].to_string(), "0/0/0/0");
        assert_eq!(totals["B"].to_string(), "1/2/3/6");
        assert_eq!(totals["C"].to_string(), "1/2/3/6");
    }

    #[test]
    fn test_unknown_recipient_is_ignored() {
        let participants = names(&["A", "B"]);
        let mut streams = MessageStreams::new();
        streams.insert(
            "A".into(),
            vec![msg(1, Recipients::Named(names(&["B", "Z"])), "2/2/2")],
        );

        let totals = StrengthAggregator::new(&participants).aggregate(&mut streams);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["B"].to_string(), "2/2/2/6");
    }

    #[test]
    fn test_aggregation_is_idempotent_and_caches() {
        let participants = names(&["A", "B"]);
        let mut streams = MessageStreams::new();
        streams.insert("A".into(), vec![msg(1, Recipients::single("B"), "1/1/1/3")]);
        streams.insert("B".into(), vec![msg(1, Recipients::single("A"), "kein Bericht")]);

        let aggregator = StrengthAggregator::new(&participants);
        let first = summarize(&aggregator.aggregate(&mut streams));
        assert_eq!(streams["A"][0].strength_reports.as_ref().map(Vec::len), Some(1));
        assert_eq!(streams["B"][0].strength_reports, Some(vec![]));

        let second = summarize(&aggregator.aggregate(&mut streams));
        assert_eq!(first, second);
    }

    #[test]
    fn test_auto_completion_fills_zero_participants_once() {
        let participants = names(&["A", "B", "C"]);
        let mut streams = MessageStreams::new();
        streams.insert(
            "A".into(),
            vec![
                msg(1, Recipients::single("B"), "Lage ruhig"),
                msg(2, Recipients::single("C"), "Stärke 1/1/1"),
            ],
        );
        streams.insert("B".into(), vec![msg(1, Recipients::single("A"), "Verstanden")]);
        streams.insert("C".into(), vec![msg(1, Recipients::single("B"), "Rückfrage")]);

        let mut rng = StdRng::seed_from_u64(17);
        let outcome = StrengthAggregator::new(&participants)
            .with_auto_completion(true)
            .run(&mut streams, &mut rng);

        // A and B had nothing; C already had a report
        assert_eq!(outcome.synthesized.len(), 2);
        assert!(outcome.totals.values().all(|t| !t.is_zero()));
        assert_eq!(outcome.summary["C"], "1/1/1/3");

        let synthesized: Vec<_> = streams
            .values()
            .flatten()
            .filter(|m| m.synthesized_strength)
            .collect();
        assert_eq!(synthesized.len(), 2);
        assert!(synthesized
            .iter()
            .all(|m| m.text.contains(SYNTHESIZED_PREFIX) && m.has_parsed_strength()));

        // A further pass without completion keeps the same numbers
        let again = summarize(&StrengthAggregator::new(&participants).aggregate(&mut streams));
        assert_eq!(again, outcome.summary);
    }

    #[test]
    fn test_auto_completion_target_for_large_inbox() {
        let participants = names(&["A", "B"]);
        let mut streams = MessageStreams::new();
        streams.insert(
            "A".into(),
            (1..=15)
                .map(|i| msg(i, Recipients::single("B"), "Meldung"))
                .collect(),
        );
        streams.insert("B".into(), Vec::new());

        let mut rng = StdRng::seed_from_u64(5);
        let outcome = StrengthAggregator::new(&participants)
            .with_auto_completion(true)
            .run(&mut streams, &mut rng);

        // 15 received → max(2, ceil(0.2 * 15)) = 3
        assert_eq!(outcome.synthesized.len(), 3);
        assert!(!outcome.totals["B"].is_zero());
        // A receives nothing and has no eligible message
        assert!(outcome.totals["A"].is_zero());
    }

    #[test]
    fn test_disabled_completion_leaves_zeros() {
        let participants = names(&["A", "B"]);
        let mut streams = MessageStreams::new();
        streams.insert("A".into(), vec![msg(1, Recipients::single("B"), "Meldung")]);

        let mut rng = StdRng::seed_from_u64(5);
        let outcome = StrengthAggregator::new(&participants).run(&mut streams, &mut rng);
        assert!(outcome.synthesized.is_empty());
        assert_eq!(outcome.summary["B"], "0/0/0/0");
    }

    #[test]
    fn test_synthesized_report_bounds() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            let r = synthesize_report(&mut rng);
            assert!(r.leader <= 2);
            assert!((1..=4).contains(&r.assistant));
            assert!((2..=12).contains(&r.helper));
            assert!(r.total() > 0);
        }
    }
}

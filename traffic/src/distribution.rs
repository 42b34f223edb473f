//! Distribution engine — assigns template text and recipients to
//! (sender, sequence) slots.
//!
//! Steps, in order:
//! 1. Generate broadcast / group / individual candidates per participant,
//!    drawing text from one cyclic [`TemplateCursor`].
//! 2. Flatten and apply a constrained shuffle so no two multi-recipient
//!    messages are adjacent in the global order.
//! 3. Land messages in sender buckets with contiguous sequence ids
//!    (slot 1 reserved for the registration message when enabled).
//! 4. Top up dictation-worthy messages per participant to the configured
//!    minimum.

use crate::model::{Message, MessageHandle, MessageKind, MessageStreams, Recipients};
use crate::quota::DistributionPlan;
use crate::templates::{is_dictation_worthy, TemplatePool};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Attempt budget for the constrained shuffle.
pub const MAX_SHUFFLE_ATTEMPTS: u32 = 100;

/// Result of the constrained shuffle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleOutcome {
    /// Permutations tried
    pub attempts: u32,
    /// Whether the accepted order has no adjacent multi-recipient pair
    pub satisfied: bool,
}

impl Default for ShuffleOutcome {
    fn default() -> Self {
        Self {
            attempts: 0,
            satisfied: true,
        }
    }
}

/// Outcome of the dictation top-up pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictationReport {
    /// Messages whose text was replaced
    pub replaced: usize,
    /// Participants still below the minimum, with the missing count
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub shortfall: BTreeMap<String, u32>,
}

/// Everything the distribution step produces
#[derive(Debug, Clone, Default)]
pub struct Distribution {
    pub streams: MessageStreams,
    /// Accepted global order of non-registration messages
    pub global_order: Vec<MessageHandle>,
    pub shuffle: ShuffleOutcome,
    pub dictation: DictationReport,
}

/// A message before it has a sender slot
#[derive(Debug, Clone)]
struct Candidate {
    sender: String,
    kind: MessageKind,
    recipients: Recipients,
    text: String,
}

/// Distribution engine for one exercise
pub struct DistributionEngine<'a> {
    participants: &'a [String],
    pool: &'a TemplatePool,
    registration_enabled: bool,
    lead: Option<&'a str>,
    call_group: Option<&'a str>,
    dictation_minimum: u32,
}

impl<'a> DistributionEngine<'a> {
    /// Create an engine over the given participants and template pool
    pub fn new(participants: &'a [String], pool: &'a TemplatePool) -> Self {
        Self {
            participants,
            pool,
            registration_enabled: false,
            lead: None,
            call_group: None,
            dictation_minimum: 0,
        }
    }

    /// Reserve slot 1 of every stream for a registration message
    pub fn with_registration(
        mut self,
        lead: Option<&'a str>,
        call_group: Option<&'a str>,
    ) -> Self {
        self.registration_enabled = true;
        self.lead = lead;
        self.call_group = call_group;
        self
    }

    /// Require at least `minimum` dictation-worthy messages per sender
    pub fn with_dictation_minimum(mut self, minimum: u32) -> Self {
        self.dictation_minimum = minimum;
        self
    }

    /// Run candidate generation, constrained shuffle, slot assignment and the
    /// dictation top-up.
    pub fn distribute<R: Rng + ?Sized>(
        &self,
        plans: &BTreeMap<String, DistributionPlan>,
        rng: &mut R,
    ) -> Distribution {
        let mut streams: MessageStreams = self
            .participants
            .iter()
            .map(|p| (p.clone(), Vec::new()))
            .collect();

        if self.pool.is_empty() {
            warn!(
                participants = self.participants.len(),
                "Template pool is empty, no messages generated"
            );
            return Distribution {
                streams,
                ..Default::default()
            };
        }

        let mut candidates = self.generate_candidates(plans, rng);
        let shuffle =
            constrained_shuffle(&mut candidates, |c: &Candidate| c.recipients.is_multi(), rng);

        if self.registration_enabled {
            for (sender, stream) in streams.iter_mut() {
                stream.push(self.registration_message(sender));
            }
        }

        let mut global_order = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let stream = streams.entry(candidate.sender.clone()).or_default();
            let sequence_id = stream.len() as u32 + 1;
            stream.push(Message::new(
                sequence_id,
                candidate.kind,
                candidate.recipients,
                candidate.text,
            ));
            global_order.push(MessageHandle::new(candidate.sender, sequence_id));
        }

        let dictation = self.enforce_dictation_minimum(&mut streams);

        info!(
            messages = global_order.len(),
            attempts = shuffle.attempts,
            adjacency_satisfied = shuffle.satisfied,
            dictation_replaced = dictation.replaced,
            "Messages distributed"
        );

        Distribution {
            streams,
            global_order,
            shuffle,
            dictation,
        }
    }

    fn generate_candidates<R: Rng + ?Sized>(
        &self,
        plans: &BTreeMap<String, DistributionPlan>,
        rng: &mut R,
    ) -> Vec<Candidate> {
        let mut cursor = self.pool.cursor();
        let mut candidates = Vec::new();

        for sender in self.participants {
            let plan = plans.get(sender).copied().unwrap_or_default();
            let others: Vec<&String> = self.participants.iter().filter(|p| *p != sender).collect();

            let mut push = |kind: MessageKind, recipients: Recipients, text: Option<&str>| {
                candidates.push(Candidate {
                    sender: sender.clone(),
                    kind,
                    recipients,
                    text: text.unwrap_or_default().to_string(),
                });
            };

            for _ in 0..plan.broadcast {
                push(MessageKind::Broadcast, Recipients::All, cursor.next());
            }
            for _ in 0..plan.group {
                let recipients = self.pick_group(sender, &others, rng);
                push(MessageKind::Group, recipients, cursor.next());
            }
            for _ in 0..plan.individual_count() {
                let recipient = others
                    .choose(rng)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| sender.clone());
                push(
                    MessageKind::Individual,
                    Recipients::single(recipient),
                    cursor.next(),
                );
            }

            debug!(
                sender = %sender,
                broadcast = plan.broadcast,
                group = plan.group,
                individual = plan.individual,
                "Candidates generated"
            );
        }

        candidates
    }

    /// Random subset of the other participants, stored in participant order.
    /// With nobody else in the exercise the sender addresses itself.
    fn pick_group<R: Rng + ?Sized>(
        &self,
        sender: &str,
        others: &[&String],
        rng: &mut R,
    ) -> Recipients {
        if others.is_empty() {
            return Recipients::single(sender);
        }
        let size = group_size(others.len(), rng);
        let chosen: HashSet<&str> = others
            .choose_multiple(rng, size)
            .map(|p| p.as_str())
            .collect();
        Recipients::Named(
            others
                .iter()
                .filter(|p| chosen.contains(p.as_str()))
                .map(|p| p.to_string())
                .collect(),
        )
    }

    fn registration_message(&self, sender: &str) -> Message {
        let recipients = self
            .lead
            .filter(|lead| *lead != sender)
            .map(Recipients::single)
            .unwrap_or(Recipients::All);
        let text = match self.call_group {
            Some(cg) => format!("{}: Anmeldung zur Übung, Rufgruppe {}", sender, cg),
            None => format!("{}: Anmeldung zur Übung", sender),
        };
        Message::new(1, MessageKind::Registration, recipients, text)
    }

    /// Replace the text of non-qualifying messages with unused dictation-worthy
    /// templates until each sender reaches the minimum, or the pool runs dry.
    fn enforce_dictation_minimum(&self, streams: &mut MessageStreams) -> DictationReport {
        let mut report = DictationReport::default();
        if self.dictation_minimum == 0 {
            return report;
        }

        let used: HashSet<String> = streams
            .values()
            .flatten()
            .map(|m| m.text.clone())
            .collect();
        let mut seen = HashSet::new();
        let mut unused: VecDeque<&str> = self
            .pool
            .dictation_worthy()
            .filter(|t| !used.contains(*t) && seen.insert(*t))
            .collect();

        for sender in self.participants {
            let Some(stream) = streams.get_mut(sender) else {
                continue;
            };
            let present = stream
                .iter()
                .filter(|m| !m.is_registration() && is_dictation_worthy(&m.text))
                .count() as u32;
            let mut gap = self.dictation_minimum.saturating_sub(present);

            for message in stream
                .iter_mut()
                .filter(|m| !m.is_registration() && !is_dictation_worthy(&m.text))
            {
                if gap == 0 {
                    break;
                }
                let Some(text) = unused.pop_front() else {
                    break;
                };
                message.text = text.to_string();
                report.replaced += 1;
                gap -= 1;
            }

            if gap > 0 {
                warn!(
                    sender = %sender,
                    missing = gap,
                    minimum = self.dictation_minimum,
                    "Not enough dictation templates to reach minimum"
                );
                report.shortfall.insert(sender.clone(), gap);
            }
        }

        report
    }
}

/// Group-subset size for a sender with `others` possible recipients.
///
/// Weighted bands: 80% two or three, 10% four up to half, 5% half to three
/// quarters, 5% near-total. Always within `1..=others` (1 when `others` is 0).
pub fn group_size<R: Rng + ?Sized>(others: usize, rng: &mut R) -> usize {
    if others == 0 {
        return 1;
    }
    let half = others.div_ceil(2);
    let three_quarters = (others * 3).div_ceil(4);

    let roll: f64 = rng.gen();
    let size = if roll < 0.80 {
        rng.gen_range(2..=3)
    } else if roll < 0.90 {
        pick_in_band(4, half, rng)
    } else if roll < 0.95 {
        pick_in_band(half, three_quarters, rng)
    } else {
        pick_in_band(others.saturating_sub(1).max(1), others, rng)
    };
    size.clamp(1, others)
}

/// Uniform pick in `low..=high`; an empty band collapses to `high`.
fn pick_in_band<R: Rng + ?Sized>(low: usize, high: usize, rng: &mut R) -> usize {
    if low >= high {
        high
    } else {
        rng.gen_range(low..=high)
    }
}

/// Whether any two neighbours both satisfy `is_multi`.
pub fn has_adjacent_multi<T>(items: &[T], is_multi: impl Fn(&T) -> bool) -> bool {
    items
        .windows(2)
        .any(|pair| is_multi(&pair[0]) && is_multi(&pair[1]))
}

/// Uniformly permute `items` until no two adjacent entries are both
/// multi-recipient, up to [`MAX_SHUFFLE_ATTEMPTS`]. On exhaustion the last
/// permutation is kept.
pub fn constrained_shuffle<T, R: Rng + ?Sized>(
    items: &mut [T],
    is_multi: impl Fn(&T) -> bool,
    rng: &mut R,
) -> ShuffleOutcome {
    for attempt in 1..=MAX_SHUFFLE_ATTEMPTS {
        items.shuffle(rng);
        if !has_adjacent_multi(items, &is_multi) {
            return ShuffleOutcome {
                attempts: attempt,
                satisfied: true,
            };
        }
    }

    warn!(
        attempts = MAX_SHUFFLE_ATTEMPTS,
        items = items.len(),
        "Constrained shuffle exhausted, keeping last order with adjacent multi-recipient messages"
    );
    ShuffleOutcome {
        attempts: MAX_SHUFFLE_ATTEMPTS,
        satisfied: false,
    }
}

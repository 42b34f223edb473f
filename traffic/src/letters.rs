//! Solution words and the letter injector.
//!
//! A participant's solution word is split into 1-based `(index, letter)`
//! pairs, shuffled, and appended as `<index><letter>` tokens to single-recipient
//! messages other participants send to them. Sorting the tokens by index
//! reconstructs the word.

use crate::model::{MessageHandle, MessageStreams};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// How solution words are assigned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SolutionWordConfig {
    /// No hidden words
    #[default]
    Disabled,
    /// Every participant gets the same word
    Central { word: String },
    /// Words drawn cyclically from a pool in participant order
    Individual { pool: Vec<String> },
}

impl SolutionWordConfig {
    /// Resolve the participant → word map. Empty words are left out.
    pub fn assign(&self, participants: &[String]) -> BTreeMap<String, String> {
        let word_for = |i: usize| -> Option<String> {
            match self {
                Self::Disabled => None,
                Self::Central { word } => Some(normalize_word(word)),
                Self::Individual { pool } if pool.is_empty() => None,
                Self::Individual { pool } => Some(normalize_word(&pool[i % pool.len()])),
            }
        };

        participants
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                word_for(i)
                    .filter(|w| !w.is_empty())
                    .map(|w| (p.clone(), w))
            })
            .collect()
    }
}

/// Upper-case and keep letters only. Digits would collide with the index
/// prefix of a token, so they are dropped along with whitespace and
/// punctuation.
pub fn normalize_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Render a letter token, e.g. `3K`.
pub fn letter_token(index: usize, letter: char) -> String {
    format!("{}{}", index, letter)
}

/// Split a token back into its index and letter.
pub fn parse_letter_token(token: &str) -> Option<(usize, char)> {
    let split = token.find(|c: char| !c.is_ascii_digit())?;
    let (digits, rest) = token.split_at(split);
    let mut chars = rest.chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some((digits.parse().ok()?, letter))
}

/// Outcome of the injection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionReport {
    /// Tokens embedded per participant
    pub embedded: BTreeMap<String, usize>,
    /// Participants with a word but no eligible message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Messages addressed to exactly `participant`, sent by someone else,
/// ordered by the sender's sequence id. Registration messages never carry
/// letters.
pub fn eligible_messages(streams: &MessageStreams, participant: &str) -> Vec<MessageHandle> {
    let mut eligible: Vec<MessageHandle> = streams
        .iter()
        .filter(|(sender, _)| sender.as_str() != participant)
        .flat_map(|(sender, stream)| {
            stream
                .iter()
                .filter(move |m| {
                    !m.is_registration() && m.recipients.sole() == Some(participant)
                })
                .map(move |m| MessageHandle::new(sender.clone(), m.sequence_id))
        })
        .collect();
    eligible.sort_by_key(|h| h.sequence_id);
    eligible
}

/// Scatters solution words across the exercise
pub struct SolutionLetterInjector<'a> {
    participants: &'a [String],
}

impl<'a> SolutionLetterInjector<'a> {
    pub fn new(participants: &'a [String]) -> Self {
        Self { participants }
    }

    /// Embed every participant's word. Letters go to the first half (rounded
    /// up) of the eligible messages first, then cycle through the full list.
    pub fn inject<R: Rng + ?Sized>(
        &self,
        streams: &mut MessageStreams,
        words: &BTreeMap<String, String>,
        rng: &mut R,
    ) -> InjectionReport {
        let mut report = InjectionReport::default();

        for participant in self.participants {
            let Some(word) = words.get(participant).filter(|w| !w.is_empty()) else {
                continue;
            };

            let eligible = eligible_messages(streams, participant);
            if eligible.is_empty() {
                debug!(participant = %participant, "No eligible messages, solution word skipped");
                report.skipped.push(participant.clone());
                continue;
            }

            let mut pairs: Vec<(usize, char)> =
                word.chars().enumerate().map(|(i, c)| (i + 1, c)).collect();
            pairs.shuffle(rng);

            let half = eligible.len().div_ceil(2);
            for (k, (index, letter)) in pairs.iter().enumerate() {
                let slot = if k < half { k } else { k % eligible.len() };
                if let Some(message) = eligible[slot].resolve_mut(streams) {
                    let token = letter_token(*index, *letter);
                    message.text.push(' ');
                    message.text.push_str(&token);
                    message.solution_letters.push(token);
                }
            }

            report.embedded.insert(participant.clone(), pairs.len());
        }

        info!(
            participants = report.embedded.len(),
            skipped = report.skipped.len(),
            "Solution letters injected"
        );
        report
    }
}

/// Collect the tokens on messages addressed to `participant`, sort by index
/// and join the letters.
pub fn reconstruct_word(streams: &MessageStreams, participant: &str) -> String {
    let mut letters: Vec<(usize, char)> = streams
        .values()
        .flatten()
        .filter(|m| m.recipients.sole() == Some(participant))
        .flat_map(|m| m.solution_letters.iter())
        .filter_map(|t| parse_letter_token(t))
        .collect();
    letters.sort_by_key(|(index, _)| *index);
    letters.into_iter().map(|(_, c)| c).collect()
}

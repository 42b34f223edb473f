//! Message model — the records every generation stage reads and enriches
//!
//! Each [`Message`] is owned by exactly one bucket: its sender's stream in
//! [`MessageStreams`]. Other stages address messages through a
//! [`MessageHandle`] (sender + sequence id) instead of sharing references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel recipient meaning "every other participant".
pub const ALL_RECIPIENTS: &str = "Alle";

/// Per-sender message streams, keyed by participant name.
pub type MessageStreams = BTreeMap<String, Vec<Message>>;

/// Who a message is addressed to.
///
/// `All` is stored as-is and only expanded when the message is consumed
/// (see [`Recipients::effective`]). On the wire it is the single-element
/// list `["Alle"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Recipients {
    All,
    Named(Vec<String>),
}

impl Recipients {
    /// Address a single participant
    pub fn single(name: impl Into<String>) -> Self {
        Self::Named(vec![name.into()])
    }

    /// Whether this message targets more than one station (group or broadcast)
    pub fn is_multi(&self) -> bool {
        match self {
            Self::All => true,
            Self::Named(names) => names.len() > 1,
        }
    }

    /// The sole recipient, if the message is addressed to exactly one name
    pub fn sole(&self) -> Option<&str> {
        match self {
            Self::Named(names) if names.len() == 1 => Some(names[0].as_str()),
            _ => None,
        }
    }

    /// Recipients at consumption time: `All` expands to every participant
    /// except the sender, and the sender is never its own recipient.
    pub fn effective<'a>(&'a self, sender: &str, participants: &'a [String]) -> Vec<&'a str> {
        match self {
            Self::All => participants
                .iter()
                .map(String::as_str)
                .filter(|p| *p != sender)
                .collect(),
            Self::Named(names) => names
                .iter()
                .map(String::as_str)
                .filter(|p| *p != sender)
                .collect(),
        }
    }

    /// Number of stored recipient entries (`All` counts as one)
    pub fn len(&self) -> usize {
        match self {
            Self::All => 1,
            Self::Named(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<String>> for Recipients {
    fn from(names: Vec<String>) -> Self {
        if names.len() == 1 && names[0] == ALL_RECIPIENTS {
            Self::All
        } else {
            Self::Named(names)
        }
    }
}

impl From<Recipients> for Vec<String> {
    fn from(recipients: Recipients) -> Self {
        match recipients {
            Recipients::All => vec![ALL_RECIPIENTS.to_string()],
            Recipients::Named(names) => names,
        }
    }
}

impl std::fmt::Display for Recipients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "{}", ALL_RECIPIENTS),
            Self::Named(names) => write!(f, "{}", names.join(", ")),
        }
    }
}

/// How a message came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Fixed slot 1 announcing the sender to the exercise lead
    Registration,
    Broadcast,
    Group,
    Individual,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::Group => write!(f, "group"),
            Self::Individual => write!(f, "individual"),
        }
    }
}

/// A leader/assistant/helper triple mined from message text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthReport {
    pub leader: u32,
    pub assistant: u32,
    pub helper: u32,
}

impl StrengthReport {
    pub fn total(&self) -> u32 {
        self.leader + self.assistant + self.helper
    }
}

impl std::fmt::Display for StrengthReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.leader,
            self.assistant,
            self.helper,
            self.total()
        )
    }
}

/// A single radio message in a sender's stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 1-based, contiguous within the sender's stream
    pub sequence_id: u32,
    pub kind: MessageKind,
    pub recipients: Recipients,
    pub text: String,
    /// Emitted `<index><letter>` tokens, in emission order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solution_letters: Vec<String>,
    /// Parsed strength triples; `None` until the aggregator has scanned the text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength_reports: Option<Vec<StrengthReport>>,
    /// Set when the aggregator appended a synthesized strength phrase
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthesized_strength: bool,
}

impl Message {
    pub fn new(
        sequence_id: u32,
        kind: MessageKind,
        recipients: Recipients,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id,
            kind,
            recipients,
            text: text.into(),
            solution_letters: Vec::new(),
            strength_reports: None,
            synthesized_strength: false,
        }
    }

    pub fn is_registration(&self) -> bool {
        self.kind == MessageKind::Registration
    }

    /// Whether the cached parse found at least one strength pattern
    pub fn has_parsed_strength(&self) -> bool {
        self.strength_reports
            .as_ref()
            .is_some_and(|reports| !reports.is_empty())
    }
}

/// Arena-style handle to a message inside [`MessageStreams`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub sender: String,
    pub sequence_id: u32,
}

impl MessageHandle {
    pub fn new(sender: impl Into<String>, sequence_id: u32) -> Self {
        Self {
            sender: sender.into(),
            sequence_id,
        }
    }

    /// Resolve against a stream map; relies on contiguous 1-based ids.
    pub fn resolve<'a>(&self, streams: &'a MessageStreams) -> Option<&'a Message> {
        let index = (self.sequence_id as usize).checked_sub(1)?;
        streams
            .get(&self.sender)?
            .get(index)
            .filter(|m| m.sequence_id == self.sequence_id)
    }

    pub fn resolve_mut<'a>(&self, streams: &'a mut MessageStreams) -> Option<&'a mut Message> {
        let index = (self.sequence_id as usize).checked_sub(1)?;
        streams
            .get_mut(&self.sender)?
            .get_mut(index)
            .filter(|m| m.sequence_id == self.sequence_id)
    }
}

impl std::fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.sender, self.sequence_id)
    }
}

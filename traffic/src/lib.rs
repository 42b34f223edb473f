//! Radio Exercise Traffic Library
//!
//! Generates synthetic radio traffic for a training exercise:
//! - Fair per-participant message streams built from a template pool
//! - Hidden solution words scattered as index-tagged letter tokens
//! - Per-recipient strength reports mined from message text
//! - Opaque participant ids and an integrity checksum
//!
//! # Pipeline
//!
//! ```text
//! QuotaPlanner → DistributionEngine → SolutionLetterInjector
//!              → StrengthAggregator → IdentityAssigner → checksum
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use traffic::{Exercise, ExerciseConfig, TemplatePool};
//!
//! let config = ExerciseConfig::from_file(Path::new("uebung.toml"))?;
//! let pool = TemplatePool::from_file(Path::new("vorlagen.txt"))?;
//! let exercise = Exercise::generate(&config, &pool, None, &mut rand::thread_rng());
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod checksum;
pub mod config;
pub mod distribution;
pub mod error;
pub mod exercise;
pub mod identity;
pub mod letters;
pub mod model;
pub mod quota;
pub mod stats;
pub mod strength;
pub mod templates;

pub use config::ExerciseConfig;
pub use error::{TrafficError, TrafficResult};
pub use exercise::Exercise;
pub use stats::{ExerciseStats, ParticipantStats};
pub use templates::{is_dictation_worthy, TemplateCursor, TemplatePool};

// Re-export core model types
pub use model::{
    Message, MessageHandle, MessageKind, MessageStreams, Recipients, StrengthReport,
    ALL_RECIPIENTS,
};

// Re-export pipeline stages
pub use distribution::{
    DictationReport, Distribution, DistributionEngine, ShuffleOutcome, MAX_SHUFFLE_ATTEMPTS,
};
pub use identity::{IdSource, IdentityAssigner, IdentityMap, PatternIdSource, SecureIdSource};
pub use letters::{reconstruct_word, InjectionReport, SolutionLetterInjector, SolutionWordConfig};
pub use quota::{DistributionPlan, QuotaConfig, QuotaPlanner, QuotaShare};
pub use strength::{StrengthAggregator, StrengthOutcome, StrengthSummary, StrengthTotals};

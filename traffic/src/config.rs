//! Exercise configuration: TOML loading, environment overrides and the
//! optional caller-side validation.

use crate::error::{TrafficError, TrafficResult};
use crate::letters::SolutionWordConfig;
use crate::model::ALL_RECIPIENTS;
use crate::quota::QuotaConfig;
use crate::templates::TemplatePool;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Everything a "generate" action needs besides the template pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseConfig {
    /// Exercise title
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Radio call group the exercise runs on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_group: Option<String>,
    /// Exercise lead station; registration messages are addressed here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead: Option<String>,
    /// Ordered, unique participant names
    pub participants: Vec<String>,
    #[serde(default)]
    pub quotas: QuotaConfig,
    #[serde(default)]
    pub solution_words: SolutionWordConfig,
    /// Participant → call-sign display name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub station_names: BTreeMap<String, String>,
    /// Inline templates, used before any template file entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
}

impl ExerciseConfig {
    /// Minimal config for the given participants with default quotas
    pub fn new(name: impl Into<String>, participants: Vec<String>) -> Self {
        Self {
            name: name.into(),
            date: None,
            call_group: None,
            lead: None,
            participants,
            quotas: QuotaConfig::default(),
            solution_words: SolutionWordConfig::Disabled,
            station_names: BTreeMap::new(),
            templates: Vec::new(),
        }
    }

    /// Template pool built from the inline `templates` list
    pub fn inline_templates(&self) -> TemplatePool {
        TemplatePool::new(self.templates.iter().cloned())
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> TrafficResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file.
    pub fn from_file(path: &Path) -> TrafficResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(
            path = %path.display(),
            participants = config.participants.len(),
            "Exercise config loaded"
        );
        Ok(config)
    }

    /// Override quota settings from `TRAFFIC_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRAFFIC_MESSAGES_PER_PARTICIPANT") {
            if let Ok(n) = val.parse() {
                self.quotas.messages_per_participant = n;
            }
        }
        if let Ok(val) = std::env::var("TRAFFIC_DICTATION_MINIMUM") {
            if let Ok(n) = val.parse() {
                self.quotas.dictation_minimum = n;
            }
        }
        if let Ok(val) = std::env::var("TRAFFIC_REGISTRATION") {
            self.quotas.registration_enabled = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("TRAFFIC_AUTO_STRENGTH") {
            self.quotas.auto_strength_completion = parse_flag(&val);
        }
    }

    /// Caller-side sanity checks. Generation itself accepts any config.
    pub fn validate(&self) -> TrafficResult<()> {
        if self.participants.is_empty() {
            return Err(TrafficError::invalid_config("participant list is empty"));
        }
        let mut seen = HashSet::new();
        for participant in &self.participants {
            if participant.trim().is_empty() {
                return Err(TrafficError::invalid_config("participant name is empty"));
            }
            if participant == ALL_RECIPIENTS {
                return Err(TrafficError::invalid_config(format!(
                    "'{}' is reserved for broadcast messages",
                    ALL_RECIPIENTS
                )));
            }
            if !seen.insert(participant.as_str()) {
                return Err(TrafficError::invalid_config(format!(
                    "duplicate participant '{}'",
                    participant
                )));
            }
        }
        if self.quotas.messages_per_participant == 0 {
            return Err(TrafficError::invalid_config(
                "messages_per_participant must be at least 1",
            ));
        }
        Ok(())
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::QuotaShare;

    const SAMPLE: &str = r#"
name = "Funkübung Nord"
date = "2026-10-18"
call_group = "41"
lead = "Leitstelle"
participants = ["Florian 1", "Florian 2", "Florian 3"]

[quotas]
messages_per_participant = 8
broadcast = 1
group = "25%"
dictation_minimum = 2
registration_enabled = true

[solution_words]
mode = "individual"
pool = ["funk", "wache"]

[station_names]
"Florian 1" = "Florian Nord 1/44"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = ExerciseConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.name, "Funkübung Nord");
        assert_eq!(config.date, NaiveDate::from_ymd_opt(2026, 10, 18));
        assert_eq!(config.lead.as_deref(), Some("Leitstelle"));
        assert_eq!(config.participants.len(), 3);
        assert_eq!(config.quotas.messages_per_participant, 8);
        assert_eq!(config.quotas.group, QuotaShare::Percent(25.0));
        assert!(config.quotas.registration_enabled);
        assert!(!config.quotas.auto_strength_completion);
        assert_eq!(
            config.solution_words,
            SolutionWordConfig::Individual {
                pool: vec!["funk".into(), "wache".into()]
            }
        );
        assert_eq!(config.station_names["Florian 1"], "Florian Nord 1/44");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config =
            ExerciseConfig::from_toml_str("name = \"x\"\nparticipants = [\"A\", \"B\"]").unwrap();
        assert_eq!(config.quotas, QuotaConfig::default());
        assert_eq!(config.solution_words, SolutionWordConfig::Disabled);
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = ExerciseConfig::from_toml_str("name = ").unwrap_err();
        assert!(matches!(err, TrafficError::ConfigParse(_)));
    }

    #[test]
    fn test_validation_rejects_bad_participants() {
        let mut config = ExerciseConfig::new("x", vec![]);
        assert!(config.validate().is_err());

        config.participants = vec!["A".into(), "A".into()];
        assert!(config.validate().unwrap_err().to_string().contains("duplicate"));

        config.participants = vec!["A".into(), "Alle".into()];
        assert!(config.validate().is_err());

        config.participants = vec!["A".into(), " ".into()];
        assert!(config.validate().is_err());

        config.participants = vec!["A".into(), "B".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("no"));
    }
}

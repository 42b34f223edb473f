//! Quota planning — how many broadcast, group and individual messages each
//! participant sends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A configured message share: an absolute count, or a percentage of the
/// per-participant total (written as `"25%"` in config files).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShareRepr", into = "ShareRepr")]
pub enum QuotaShare {
    Count(u32),
    Percent(f64),
}

impl QuotaShare {
    /// Resolve to a message count for the given per-participant total.
    pub fn resolve(&self, total: u32) -> u32 {
        match *self {
            Self::Count(n) => n,
            Self::Percent(p) => (f64::from(total) * p / 100.0).round().max(0.0) as u32,
        }
    }
}

impl Default for QuotaShare {
    fn default() -> Self {
        Self::Count(0)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ShareRepr {
    Count(u32),
    Text(String),
}

impl TryFrom<ShareRepr> for QuotaShare {
    type Error = String;

    fn try_from(repr: ShareRepr) -> Result<Self, Self::Error> {
        match repr {
            ShareRepr::Count(n) => Ok(Self::Count(n)),
            ShareRepr::Text(text) => {
                let trimmed = text.trim();
                match trimmed.strip_suffix('%') {
                    Some(number) => number
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|p| p.is_finite() && *p >= 0.0)
                        .map(Self::Percent)
                        .ok_or_else(|| format!("invalid percentage share '{}'", text)),
                    None => trimmed
                        .parse::<u32>()
                        .map(Self::Count)
                        .map_err(|_| format!("invalid message share '{}'", text)),
                }
            }
        }
    }
}

impl From<QuotaShare> for ShareRepr {
    fn from(share: QuotaShare) -> Self {
        match share {
            QuotaShare::Count(n) => ShareRepr::Count(n),
            QuotaShare::Percent(p) => ShareRepr::Text(format!("{}%", p)),
        }
    }
}

/// Quota configuration shared by all participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaConfig {
    pub messages_per_participant: u32,
    #[serde(default)]
    pub broadcast: QuotaShare,
    #[serde(default)]
    pub group: QuotaShare,
    #[serde(default)]
    pub dictation_minimum: u32,
    #[serde(default)]
    pub registration_enabled: bool,
    #[serde(default)]
    pub auto_strength_completion: bool,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            messages_per_participant: 10,
            broadcast: QuotaShare::Count(1),
            group: QuotaShare::Count(2),
            dictation_minimum: 0,
            registration_enabled: false,
            auto_strength_completion: false,
        }
    }
}

/// Message counts for one participant.
///
/// `individual` is signed: when broadcast + group exceed the total it goes
/// negative and simply yields no individual messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub broadcast: u32,
    pub group: u32,
    pub individual: i64,
}

impl DistributionPlan {
    /// Number of individual messages actually generated
    pub fn individual_count(&self) -> usize {
        usize::try_from(self.individual).unwrap_or(0)
    }
}

/// Derives per-participant [`DistributionPlan`]s from a [`QuotaConfig`].
#[derive(Debug, Clone)]
pub struct QuotaPlanner {
    total: u32,
    broadcast: u32,
    group: u32,
    registration_enabled: bool,
}

impl QuotaPlanner {
    pub fn new(quotas: &QuotaConfig) -> Self {
        let total = quotas.messages_per_participant;
        Self {
            total,
            broadcast: quotas.broadcast.resolve(total),
            group: quotas.group.resolve(total),
            registration_enabled: quotas.registration_enabled,
        }
    }

    /// Individual = T − R − B − G, unvalidated.
    pub fn plan(&self) -> DistributionPlan {
        let reserved = i64::from(self.registration_enabled);
        DistributionPlan {
            broadcast: self.broadcast,
            group: self.group,
            individual: i64::from(self.total)
                - reserved
                - i64::from(self.broadcast)
                - i64::from(self.group),
        }
    }

    /// Same plan for every participant, keyed by name.
    pub fn plan_all(&self, participants: &[String]) -> BTreeMap<String, DistributionPlan> {
        let plan = self.plan();
        participants.iter().map(|p| (p.clone(), plan)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quotas(total: u32, broadcast: QuotaShare, group: QuotaShare, reg: bool) -> QuotaConfig {
        QuotaConfig {
            messages_per_participant: total,
            broadcast,
            group,
            registration_enabled: reg,
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_subtracts_registration_slot() {
        let planner = QuotaPlanner::new(&quotas(
            10,
            QuotaShare::Count(2),
            QuotaShare::Count(3),
            true,
        ));
        let plan = planner.plan();
        assert_eq!(plan.broadcast, 2);
        assert_eq!(plan.group, 3);
        assert_eq!(plan.individual, 4);
        assert_eq!(plan.individual_count(), 4);
    }

    #[test]
    fn test_negative_individual_is_kept_but_yields_nothing() {
        let planner = QuotaPlanner::new(&quotas(
            3,
            QuotaShare::Count(2),
            QuotaShare::Count(3),
            false,
        ));
        let plan = planner.plan();
        assert_eq!(plan.individual, -2);
        assert_eq!(plan.individual_count(), 0);
    }

    #[test]
    fn test_percent_share_resolution() {
        assert_eq!(QuotaShare::Percent(25.0).resolve(10), 3);
        assert_eq!(QuotaShare::Percent(20.0).resolve(10), 2);
        assert_eq!(QuotaShare::Percent(0.0).resolve(10), 0);
        assert_eq!(QuotaShare::Count(4).resolve(10), 4);
    }

    #[test]
    fn test_share_parsing() {
        #[derive(Deserialize)]
        struct Holder {
            share: QuotaShare,
        }
        let parsed: Holder = toml::from_str("share = 3").unwrap();
        assert_eq!(parsed.share, QuotaShare::Count(3));
        let parsed: Holder = toml::from_str("share = \"30%\"").unwrap();
        assert_eq!(parsed.share, QuotaShare::Percent(30.0));
        let parsed: Holder = toml::from_str("share = \"5\"").unwrap();
        assert_eq!(parsed.share, QuotaShare::Count(5));
        assert!(toml::from_str::<Holder>("share = \"viel\"").is_err());
        assert!(toml::from_str::<Holder>("share = \"-5%\"").is_err());
    }

    #[test]
    fn test_plan_all_covers_every_participant() {
        let participants = vec!["A".to_string(), "B".to_string()];
        let plans = QuotaPlanner::new(&QuotaConfig::default()).plan_all(&participants);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans["A"], plans["B"]);
    }
}

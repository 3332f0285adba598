//! Visitor intent scoring.
//!
//! A scorer maps a session's aggregates to an [`IntentLabel`]. Two policies
//! exist, additive points and weighted percentage; both share the same
//! contract:
//!
//! - a suspicious user agent always yields [`IntentLabel::Suspicious`]
//! - every other signal can only raise the score
//! - the label is the highest bucket whose threshold the score meets

pub mod additive;
pub mod weighted;

use crate::classifier::{is_suspicious_agent, DeviceType};
use crate::session::SessionRecord;
use serde::{Deserialize, Serialize};

pub use additive::AdditiveScorer;
pub use weighted::WeightedScorer;

/// Derived estimate of how serious a visit looks. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntentLabel {
    Suspicious,
    Casual,
    Curious,
    Interested,
    LikelyRecruiter,
}

impl IntentLabel {
    /// Every label, bot label first, then buckets in ascending order.
    pub const ALL: [IntentLabel; 5] = [
        IntentLabel::Suspicious,
        IntentLabel::Casual,
        IntentLabel::Curious,
        IntentLabel::Interested,
        IntentLabel::LikelyRecruiter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentLabel::Suspicious => "Suspicious / Bot",
            IntentLabel::Casual => "Casual / Quick Look",
            IntentLabel::Curious => "Curious Browser",
            IntentLabel::Interested => "Interested Visitor",
            IntentLabel::LikelyRecruiter => "Likely Recruiter / Serious Review",
        }
    }
}

impl std::fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated session signals fed to a scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringInput {
    pub device_type: DeviceType,
    pub source: String,
    pub visit_number: u32,
    pub active_secs: u64,
    /// 0-100
    pub scroll_depth: u8,
    pub event_count: usize,
    pub suspicious: bool,
}

impl ScoringInput {
    /// Build the input from a stored record's own aggregates.
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            device_type: record.context.device_type,
            source: record.context.source.clone(),
            visit_number: record.visit_number,
            active_secs: record.active_secs,
            scroll_depth: record.max_scroll_pct.min(100),
            event_count: record.events.len(),
            suspicious: is_suspicious_agent(&record.context.user_agent),
        }
    }
}

/// A scoring policy.
pub trait IntentScorer: Send + Sync {
    fn score(&self, input: &ScoringInput) -> IntentLabel;

    /// Policy name for reports.
    fn name(&self) -> &'static str;
}

/// Pick the highest bucket whose threshold is met.
///
/// `thresholds` lists (minimum score, label) in ascending order; anything
/// below the first threshold is [`IntentLabel::Casual`].
pub(crate) fn bucket<T: PartialOrd + Copy>(score: T, thresholds: &[(T, IntentLabel)]) -> IntentLabel {
    thresholds
        .iter()
        .rev()
        .find(|(min, _)| score >= *min)
        .map(|(_, label)| *label)
        .unwrap_or(IntentLabel::Casual)
}

/// Which scoring policy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    #[default]
    Additive,
    Weighted,
}

impl ScoringStrategy {
    pub fn scorer(&self) -> Box<dyn IntentScorer> {
        match self {
            ScoringStrategy::Additive => Box::new(AdditiveScorer),
            ScoringStrategy::Weighted => Box::new(WeightedScorer),
        }
    }
}

impl std::str::FromStr for ScoringStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "additive" | "points" => Ok(ScoringStrategy::Additive),
            "weighted" | "percentage" => Ok(ScoringStrategy::Weighted),
            other => Err(format!("unknown scoring strategy '{other}'")),
        }
    }
}

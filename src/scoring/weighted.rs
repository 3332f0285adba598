//! Weighted percentage scoring.
//!
//! Each signal is normalised to 0-1 and multiplied by a fixed weight; the
//! weights sum to 100, so the result reads as a percentage.

use crate::classifier::{is_social_app, DeviceType, DIRECT};
use crate::scoring::{bucket, IntentLabel, IntentScorer, ScoringInput};

const WEIGHT_DEVICE: f64 = 15.0;
const WEIGHT_SOURCE: f64 = 25.0;
const WEIGHT_VISITS: f64 = 10.0;
const WEIGHT_DURATION: f64 = 20.0;
const WEIGHT_SCROLL: f64 = 15.0;
const WEIGHT_INTERACTIONS: f64 = 15.0;

/// Active time at which the duration signal saturates.
const FULL_DURATION_SECS: f64 = 120.0;

const THRESHOLDS: [(f64, IntentLabel); 3] = [
    (25.0, IntentLabel::Curious),
    (45.0, IntentLabel::Interested),
    (60.0, IntentLabel::LikelyRecruiter),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedScorer;

fn device_signal(device_type: DeviceType) -> f64 {
    match device_type {
        DeviceType::Desktop => 1.0,
        DeviceType::Tablet => 0.5,
        DeviceType::Mobile => 0.2,
    }
}

fn source_signal(source: &str) -> f64 {
    match source {
        "LinkedIn" => 1.0,
        "Google Search" => 0.7,
        s if s == DIRECT => 0.4,
        s if is_social_app(s) => 0.2,
        "Unknown" => 0.3,
        _ => 0.5,
    }
}

impl WeightedScorer {
    /// Score in 0-100.
    pub fn percentage(input: &ScoringInput) -> f64 {
        let visits = (f64::from(input.visit_number.saturating_sub(1)) / 3.0).min(1.0);
        let duration = (input.active_secs as f64 / FULL_DURATION_SECS).min(1.0);
        let scroll = f64::from(input.scroll_depth.min(100)) / 100.0;
        let interactions = (input.event_count as f64 / 2.0).min(1.0);

        WEIGHT_DEVICE * device_signal(input.device_type)
            + WEIGHT_SOURCE * source_signal(&input.source)
            + WEIGHT_VISITS * visits
            + WEIGHT_DURATION * duration
            + WEIGHT_SCROLL * scroll
            + WEIGHT_INTERACTIONS * interactions
    }
}

impl IntentScorer for WeightedScorer {
    fn score(&self, input: &ScoringInput) -> IntentLabel {
        if input.suspicious {
            return IntentLabel::Suspicious;
        }
        bucket(Self::percentage(input), &THRESHOLDS)
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_100() {
        let total = WEIGHT_DEVICE
            + WEIGHT_SOURCE
            + WEIGHT_VISITS
            + WEIGHT_DURATION
            + WEIGHT_SCROLL
            + WEIGHT_INTERACTIONS;
        assert!((total - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_maximal_input_is_100() {
        let input = ScoringInput {
            device_type: DeviceType::Desktop,
            source: "LinkedIn".to_string(),
            visit_number: 10,
            active_secs: 3600,
            scroll_depth: 100,
            event_count: 10,
            suspicious: false,
        };
        assert!((WeightedScorer::percentage(&input) - 100.0).abs() < 1e-9);
        assert_eq!(WeightedScorer.score(&input), IntentLabel::LikelyRecruiter);
    }

    #[test]
    fn test_direct_desktop_skim_is_curious() {
        let input = ScoringInput {
            device_type: DeviceType::Desktop,
            source: "Direct".to_string(),
            visit_number: 1,
            active_secs: 20,
            scroll_depth: 30,
            event_count: 0,
            suspicious: false,
        };
        // 15 + 10 + 0 + 3.33 + 4.5
        let pct = WeightedScorer::percentage(&input);
        assert!(pct > 25.0 && pct < 45.0, "{pct}");
        assert_eq!(WeightedScorer.score(&input), IntentLabel::Curious);
    }
}

//! Additive integer point scoring.

use crate::classifier::{is_social_app, DeviceType};
use crate::scoring::{bucket, IntentLabel, IntentScorer, ScoringInput};

/// Points needed for each bucket, ascending.
const THRESHOLDS: [(u32, IntentLabel); 3] = [
    (3, IntentLabel::Curious),
    (6, IntentLabel::Interested),
    (10, IntentLabel::LikelyRecruiter),
];

/// Sums fixed points per signal and buckets the total.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdditiveScorer;

impl AdditiveScorer {
    /// Raw point total, before bucketing.
    pub fn points(input: &ScoringInput) -> u32 {
        let device = match input.device_type {
            DeviceType::Desktop => 3,
            DeviceType::Tablet => 1,
            DeviceType::Mobile => 0,
        };

        let source = match input.source.as_str() {
            "LinkedIn" => 4,
            "Google Search" => 2,
            s if is_social_app(s) => 0,
            _ => 1,
        };

        let visits = match input.visit_number {
            0..=1 => 0,
            2 => 1,
            _ => 2,
        };

        let duration = match input.active_secs {
            0..=29 => 0,
            30..=59 => 1,
            _ => 2,
        };

        let scroll = match input.scroll_depth {
            0..=49 => 0,
            50..=74 => 1,
            _ => 2,
        };

        let interaction = if input.event_count > 0 { 2 } else { 0 };

        device + source + visits + duration + scroll + interaction
    }
}

impl IntentScorer for AdditiveScorer {
    fn score(&self, input: &ScoringInput) -> IntentLabel {
        if input.suspicious {
            return IntentLabel::Suspicious;
        }
        bucket(Self::points(input), &THRESHOLDS)
    }

    fn name(&self) -> &'static str {
        "additive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_breakdown() {
        let input = ScoringInput {
            device_type: DeviceType::Desktop,
            source: "LinkedIn".to_string(),
            visit_number: 3,
            active_secs: 120,
            scroll_depth: 90,
            event_count: 4,
            suspicious: false,
        };
        assert_eq!(AdditiveScorer::points(&input), 3 + 4 + 2 + 2 + 2 + 2);
    }

    #[test]
    fn test_bucket_boundaries() {
        let mut input = ScoringInput {
            device_type: DeviceType::Desktop,
            source: "Instagram".to_string(),
            visit_number: 1,
            active_secs: 0,
            scroll_depth: 0,
            event_count: 0,
            suspicious: false,
        };
        // 3 points: desktop only
        assert_eq!(AdditiveScorer.score(&input), IntentLabel::Curious);

        // 6 points: desktop, second visit, 30s active, half scrolled
        input.visit_number = 2;
        input.active_secs = 30;
        input.scroll_depth = 50;
        assert_eq!(AdditiveScorer::points(&input), 6);
        assert_eq!(AdditiveScorer.score(&input), IntentLabel::Interested);

        input.source = "LinkedIn".to_string();
        assert_eq!(AdditiveScorer::points(&input), 10);
        assert_eq!(AdditiveScorer.score(&input), IntentLabel::LikelyRecruiter);
    }
}

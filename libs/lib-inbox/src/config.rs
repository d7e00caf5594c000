use serde::Deserialize;

/// Weights and thresholds for every heuristic in the inbox pipeline.
///
/// All fields have defaults so a partial `[scoring]` table in the server config
/// only overrides what it names.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub bot_threshold: i32,
    pub sender_weight: i32,
    pub subject_weight: i32,
    pub body_weight: i32,
    pub header_weight: i32,
    pub human_weight: i32,
    pub human_min_matches: usize,
    pub short_body_weight: i32,
    pub short_body_chars: usize,
    pub link_weight: i32,
    pub max_links: usize,
    /// Added on top of the built-in transactional domains
    pub extra_bot_domains: Vec<String>,

    pub match_threshold: f64,
    pub generic_threshold_factor: f64,
    pub generic_top_n: usize,
    pub specific_top_n: usize,
    pub duplicate_threshold: f64,

    pub min_body_chars: usize,
    pub min_cleaned_body_chars: usize,
    pub min_request_chars: usize,
}

pub const BOT_THRESHOLD: i32 = 3;
pub const MATCH_THRESHOLD: f64 = 0.75;
pub const GENERIC_THRESHOLD_FACTOR: f64 = 0.7;
pub const DUPLICATE_THRESHOLD: f64 = 0.85;

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            bot_threshold: BOT_THRESHOLD,
            sender_weight: 3,
            subject_weight: 2,
            body_weight: 2,
            header_weight: 2,
            human_weight: -2,
            human_min_matches: 2,
            short_body_weight: 1,
            short_body_chars: 50,
            link_weight: 1,
            max_links: 3,
            extra_bot_domains: vec![],
            match_threshold: MATCH_THRESHOLD,
            generic_threshold_factor: GENERIC_THRESHOLD_FACTOR,
            generic_top_n: 10,
            specific_top_n: 3,
            duplicate_threshold: DUPLICATE_THRESHOLD,
            min_body_chars: 10,
            min_cleaned_body_chars: 5,
            min_request_chars: 3,
        }
    }
}

impl ScoringConfig {
    pub fn effective_threshold(&self, is_generic: bool) -> f64 {
        if is_generic {
            self.match_threshold * self.generic_threshold_factor
        } else {
            self.match_threshold
        }
    }

    pub fn top_n(&self, is_generic: bool) -> usize {
        if is_generic {
            self.generic_top_n
        } else {
            self.specific_top_n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_defaults() {
        let scoring: ScoringConfig =
            serde_json::from_str(r#"{"bot_threshold": 4, "extra_bot_domains": ["hubspot.com"]}"#)
                .unwrap();
        assert_eq!(scoring.bot_threshold, 4);
        assert_eq!(scoring.extra_bot_domains, vec!["hubspot.com".to_string()]);
        assert_eq!(scoring.sender_weight, 3);
        assert_eq!(scoring.specific_top_n, 3);
    }

    #[test]
    fn test_generic_threshold() {
        let scoring = ScoringConfig::default();
        assert!((scoring.effective_threshold(true) - 0.525).abs() < 1e-9);
        assert_eq!(scoring.effective_threshold(false), 0.75);
        assert_eq!(scoring.top_n(true), 10);
    }
}

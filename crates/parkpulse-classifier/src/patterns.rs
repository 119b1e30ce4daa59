//! Keyword pattern matcher.
//!
//! Cheap third step of the hierarchy: flagship coaster and water-ride
//! patterns map to tier 1, kiddie/carousel/theater patterns to tier 3,
//! everything else returns no match and falls through to the AI step.

use serde::Serialize;

/// A successful pattern match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatch {
    pub tier: i32,
    /// 0.60-0.85 depending on pattern strength
    pub confidence: f64,
    /// The keyword that fired
    pub matched_pattern: String,
}

/// Strong tier-1 signals: signature coasters and major water rides.
const TIER_1_STRONG: [&str; 8] = [
    "hypercoaster",
    "giga",
    "launch coaster",
    "inverted coaster",
    "mountain",
    "kraken",
    "leviathan",
    "fury",
];

/// Ordinary tier-1 signals.
const TIER_1_WEAK: [&str; 6] = [
    "coaster",
    "flume",
    "rapids",
    "splash",
    "plunge",
    "drop tower",
];

/// Strong tier-3 signals: kiddie and flat rides.
const TIER_3_STRONG: [&str; 7] = [
    "carousel",
    "merry-go-round",
    "kiddie",
    "junior",
    "teacups",
    "tea party",
    "dumbo",
];

/// Ordinary tier-3 signals: shows and low-capacity diversions.
const TIER_3_WEAK: [&str; 6] = [
    "theater",
    "theatre",
    "playground",
    "train ride",
    "sing along",
    "hall of",
];

/// Keyword-rule classifier over normalized ride names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternMatcher;

impl PatternMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify a ride name, returning `None` when no pattern fires.
    #[must_use]
    pub fn classify(&self, ride_name: &str) -> Option<PatternMatch> {
        let name = ride_name.to_lowercase();

        // Tier 3 strong patterns win over tier 1 weak ones: a "kiddie
        // coaster" is a kiddie ride, not a flagship.
        if let Some(keyword) = first_match(&name, &TIER_3_STRONG) {
            return Some(PatternMatch {
                tier: 3,
                confidence: 0.85,
                matched_pattern: keyword.to_string(),
            });
        }
        if let Some(keyword) = first_match(&name, &TIER_1_STRONG) {
            return Some(PatternMatch {
                tier: 1,
                confidence: 0.85,
                matched_pattern: keyword.to_string(),
            });
        }
        if let Some(keyword) = first_match(&name, &TIER_1_WEAK) {
            return Some(PatternMatch {
                tier: 1,
                confidence: 0.60,
                matched_pattern: keyword.to_string(),
            });
        }
        if let Some(keyword) = first_match(&name, &TIER_3_WEAK) {
            return Some(PatternMatch {
                tier: 3,
                confidence: 0.60,
                matched_pattern: keyword.to_string(),
            });
        }

        None
    }
}

fn first_match<'a>(name: &str, keywords: &[&'a str]) -> Option<&'a str> {
    keywords.iter().find(|k| name.contains(*k)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_1_coaster_keywords() {
        let matcher = PatternMatcher::new();

        let result = matcher.classify("Space Mountain").unwrap();
        assert_eq!(result.tier, 1);
        assert!(result.confidence > 0.6);

        let result = matcher.classify("Incredicoaster").unwrap();
        assert_eq!(result.tier, 1);
        assert!(result.confidence >= 0.6);
    }

    #[test]
    fn test_tier_1_water_ride_keywords() {
        let matcher = PatternMatcher::new();
        let result = matcher.classify("Splash Mountain").unwrap();
        assert_eq!(result.tier, 1);

        let result = matcher.classify("Congo River Rapids").unwrap();
        assert_eq!(result.tier, 1);
    }

    #[test]
    fn test_tier_3_kiddie_keywords() {
        let matcher = PatternMatcher::new();
        let result = matcher.classify("Dumbo the Flying Elephant").unwrap();
        assert_eq!(result.tier, 3);
        assert!(result.confidence > 0.6);
    }

    #[test]
    fn test_tier_3_carousel_keywords() {
        let matcher = PatternMatcher::new();
        let result = matcher.classify("Prince Charming Regal Carousel").unwrap();
        assert_eq!(result.tier, 3);
        // French spelling does not match; that is expected
        assert!(matcher.classify("Le Carrousel de Lancelot").is_none());
    }

    #[test]
    fn test_tier_3_theater_keywords() {
        let matcher = PatternMatcher::new();
        let result = matcher.classify("Mickey's PhilharMagic Theater").unwrap();
        assert_eq!(result.tier, 3);
    }

    #[test]
    fn test_kiddie_coaster_is_tier_3() {
        // Strong tier-3 pattern beats the weak "coaster" pattern
        let matcher = PatternMatcher::new();
        let result = matcher.classify("Kiddie Coaster").unwrap();
        assert_eq!(result.tier, 3);
    }

    #[test]
    fn test_unknown_ride_returns_none() {
        let matcher = PatternMatcher::new();
        assert!(matcher.classify("Haunted Mansion").is_none());
        assert!(matcher.classify("Pirates of the Caribbean").is_none());
    }

    #[test]
    fn test_confidence_range() {
        let matcher = PatternMatcher::new();
        for name in ["Space Mountain", "Dumbo", "Some Theater", "Log Flume"] {
            if let Some(result) = matcher.classify(name) {
                assert!((0.60..=0.85).contains(&result.confidence), "{name}");
            }
        }
    }
}

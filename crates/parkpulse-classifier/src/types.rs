//! Classifier type definitions.

use serde::{Deserialize, Serialize};

use parkpulse_core::metrics::tier_weight;

/// How a tier was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    /// From the manual override CSV
    ManualOverride,
    /// From the exact-match JSON cache
    CachedMatch,
    /// From the keyword pattern matcher
    Pattern,
    /// From the AI classifier
    Ai,
}

impl ClassificationMethod {
    /// Convert to database string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ManualOverride => "manual_override",
            Self::CachedMatch => "cached_match",
            Self::Pattern => "pattern",
            Self::Ai => "ai",
        }
    }

    /// Convert from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual_override" => Some(Self::ManualOverride),
            "cached_match" => Some(Self::CachedMatch),
            "pattern" => Some(Self::Pattern),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

/// Validated output of the AI classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiClassification {
    pub tier: i32,
    /// ATTRACTION / SHOW / MEET_AND_GREET / EXPERIENCE
    pub category: String,
    /// Always within [0.50, 1.00] after validation
    pub confidence: f64,
    pub reasoning: String,
    pub research_sources: Vec<String>,
}

/// Final tier assignment produced by the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAssignment {
    pub tier: i32,
    pub tier_weight: i32,
    pub method: ClassificationMethod,
    pub confidence: f64,
    pub reasoning: String,
    pub sources: Vec<String>,
}

impl TierAssignment {
    /// Build an assignment, deriving the weight from the tier table.
    #[must_use]
    pub fn new(
        tier: i32,
        method: ClassificationMethod,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            tier,
            tier_weight: tier_weight(Some(tier)),
            method,
            confidence,
            reasoning: reasoning.into(),
            sources: Vec::new(),
        }
    }

    /// Attach research sources.
    #[must_use]
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_derives_weight() {
        let a = TierAssignment::new(1, ClassificationMethod::Pattern, 0.8, "coaster");
        assert_eq!(a.tier_weight, 3);
        let b = TierAssignment::new(3, ClassificationMethod::Pattern, 0.7, "carousel");
        assert_eq!(b.tier_weight, 1);
    }

    #[test]
    fn test_method_round_trip() {
        for method in [
            ClassificationMethod::ManualOverride,
            ClassificationMethod::CachedMatch,
            ClassificationMethod::Pattern,
            ClassificationMethod::Ai,
        ] {
            assert_eq!(ClassificationMethod::parse(method.as_str()), Some(method));
        }
    }
}

//! AI response parsing and validation.
//!
//! The model is asked for a JSON object but routinely wraps it in markdown
//! fences or prose. The parser extracts the first JSON object it can find,
//! then validates tier, category, and confidence ranges.

use serde::Deserialize;

use crate::error::ClassifierError;
use crate::types::AiClassification;

const VALID_CATEGORIES: [&str; 4] = ["ATTRACTION", "SHOW", "MEET_AND_GREET", "EXPERIENCE"];

#[derive(Debug, Deserialize)]
struct WireClassification {
    tier: i32,
    category: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    research_sources: Vec<String>,
}

/// Parse and validate an AI classification response.
///
/// # Errors
/// Returns [`ClassifierError::InvalidResponse`] for malformed JSON or
/// out-of-range tier/category/confidence values.
pub fn parse_ai_response(raw: &str) -> Result<AiClassification, ClassifierError> {
    let json_text = extract_json_object(raw)
        .ok_or_else(|| ClassifierError::InvalidResponse("no JSON object in response".into()))?;

    let wire: WireClassification = serde_json::from_str(json_text)
        .map_err(|e| ClassifierError::InvalidResponse(format!("Invalid JSON: {e}")))?;

    if !(1..=3).contains(&wire.tier) {
        return Err(ClassifierError::InvalidResponse(format!(
            "tier {} outside 1-3",
            wire.tier
        )));
    }
    if !VALID_CATEGORIES.contains(&wire.category.as_str()) {
        return Err(ClassifierError::InvalidResponse(format!(
            "unknown category '{}'",
            wire.category
        )));
    }
    if !(0.50..=1.00).contains(&wire.confidence) {
        return Err(ClassifierError::InvalidResponse(format!(
            "confidence {} outside [0.50, 1.00]",
            wire.confidence
        )));
    }

    Ok(AiClassification {
        tier: wire.tier,
        category: wire.category,
        confidence: wire.confidence,
        reasoning: wire.reasoning,
        research_sources: wire.research_sources,
    })
}

/// Find the first balanced JSON object in the text.
///
/// Handles bare JSON, ```json fences, and objects embedded in prose.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json_response() {
        let response = r#"{
  "tier": 1,
  "category": "ATTRACTION",
  "confidence": 0.85,
  "reasoning": "Signature E-ticket attraction",
  "research_sources": ["https://rcdb.com/123", "https://example.com"]
}"#;
        let result = parse_ai_response(response).unwrap();
        assert_eq!(result.tier, 1);
        assert_eq!(result.category, "ATTRACTION");
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.research_sources.len(), 2);
        assert!(result.research_sources[0].contains("rcdb.com"));
    }

    #[test]
    fn test_parse_json_with_markdown_fences() {
        let response = "Here is the classification:\n```json\n{\"tier\": 2, \"category\": \"ATTRACTION\", \"confidence\": 0.70, \"reasoning\": \"Standard dark ride\", \"research_sources\": []}\n```\nLet me know if you need more.";
        let result = parse_ai_response(response).unwrap();
        assert_eq!(result.tier, 2);
        assert_eq!(result.confidence, 0.70);
    }

    #[test]
    fn test_parse_json_with_extra_text() {
        let response = "Based on my research:\n{\"tier\": 3, \"category\": \"ATTRACTION\", \"confidence\": 0.65, \"reasoning\": \"Kiddie ride\", \"research_sources\": []}\nConfidence is moderate.";
        let result = parse_ai_response(response).unwrap();
        assert_eq!(result.tier, 3);
        assert!(result.research_sources.is_empty());
    }

    #[test]
    fn test_all_valid_tiers_accepted() {
        for tier in 1..=3 {
            let response = format!(
                "{{\"tier\": {tier}, \"category\": \"ATTRACTION\", \"confidence\": 0.75, \"reasoning\": \"x\", \"research_sources\": []}}"
            );
            assert_eq!(parse_ai_response(&response).unwrap().tier, tier);
        }
    }

    #[test]
    fn test_tier_out_of_range_rejected() {
        for tier in [0, 4, -1] {
            let response = format!(
                "{{\"tier\": {tier}, \"category\": \"ATTRACTION\", \"confidence\": 0.75, \"reasoning\": \"x\", \"research_sources\": []}}"
            );
            assert!(parse_ai_response(&response).is_err());
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let response = r#"{"tier": 2, "category": "RESTAURANT", "confidence": 0.75, "reasoning": "x", "research_sources": []}"#;
        assert!(parse_ai_response(response).is_err());
    }

    #[test]
    fn test_all_categories_accepted() {
        for category in ["ATTRACTION", "SHOW", "MEET_AND_GREET", "EXPERIENCE"] {
            let response = format!(
                "{{\"tier\": 2, \"category\": \"{category}\", \"confidence\": 0.80, \"reasoning\": \"x\", \"research_sources\": []}}"
            );
            assert_eq!(parse_ai_response(&response).unwrap().category, category);
        }
    }

    #[test]
    fn test_confidence_bounds() {
        let low = r#"{"tier": 2, "category": "ATTRACTION", "confidence": 0.50, "reasoning": "x", "research_sources": []}"#;
        let high = r#"{"tier": 1, "category": "ATTRACTION", "confidence": 1.00, "reasoning": "x", "research_sources": []}"#;
        assert_eq!(parse_ai_response(low).unwrap().confidence, 0.50);
        assert_eq!(parse_ai_response(high).unwrap().confidence, 1.00);

        let too_low = r#"{"tier": 2, "category": "ATTRACTION", "confidence": 0.49, "reasoning": "x", "research_sources": []}"#;
        let too_high = r#"{"tier": 2, "category": "ATTRACTION", "confidence": 1.01, "reasoning": "x", "research_sources": []}"#;
        assert!(parse_ai_response(too_low).is_err());
        assert!(parse_ai_response(too_high).is_err());
    }

    #[test]
    fn test_invalid_json_rejected() {
        let response = r#"{"tier": 1, "category": "ATTRACTION", "confidence": 0.85, invalid json}"#;
        let err = parse_ai_response(response).unwrap_err();
        assert!(err.to_string().contains("Invalid"));
    }

    #[test]
    fn test_no_json_rejected() {
        let response = "I could not determine a tier for this ride.";
        assert!(parse_ai_response(response).is_err());
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_extraction() {
        let response = r#"{"tier": 2, "category": "ATTRACTION", "confidence": 0.75, "reasoning": "uses {weird} braces", "research_sources": []}"#;
        let result = parse_ai_response(response).unwrap();
        assert!(result.reasoning.contains("{weird}"));
    }
}

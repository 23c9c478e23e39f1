use std::str::FromStr;

use newsflow_models::{Classification, Sentiment};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ClassifyError;

/// Extract the first JSON object from a string that may contain surrounding text.
///
/// Handles the shapes external classifiers tend to print:
/// - Clean JSON: `{"sentiment": "positive"}`
/// - Markdown-wrapped: ```json\n{"sentiment": "positive"}\n```
/// - Prefix text: `Result:\n{"sentiment": "positive"}`
pub fn extract_json(text: &str) -> Result<String, ClassifyError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_object(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(ClassifyError::Parse(format!(
        "No valid JSON object found in classifier output (length={})",
        text.len()
    )))
}

fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].trim().to_string());
            }
        }
    }

    None
}

/// Find the first balanced { ... } in the text, ignoring braces inside strings.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// Wire shape accepted from external classifiers. `label` is accepted as an
/// alias of `sentiment`; tickers are optional.
#[derive(Debug, Deserialize)]
struct ClassifierReply {
    #[serde(alias = "label")]
    sentiment: String,
    confidence: Decimal,
    #[serde(default)]
    tickers: Vec<String>,
}

/// Parse a `Classification` from raw classifier output.
pub fn parse_classification(raw: &str) -> Result<Classification, ClassifyError> {
    let json_str = extract_json(raw)?;
    let reply: ClassifierReply = serde_json::from_str(&json_str).map_err(|e| {
        ClassifyError::Parse(format!("Failed to parse classification: {e}\nJSON: {json_str}"))
    })?;
    let sentiment = Sentiment::from_str(&reply.sentiment).map_err(ClassifyError::Parse)?;

    Ok(Classification {
        sentiment,
        confidence: reply.confidence,
        tickers: reply.tickers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn extract_clean_json() {
        let input = r#"{"sentiment": "positive", "confidence": 0.8}"#;
        assert_eq!(extract_json(input).unwrap(), input);
    }

    #[test]
    fn extract_from_markdown() {
        let input = "Here you go:\n```json\n{\"confidence\": 0.75}\n```\nDone.";
        assert_eq!(extract_json(input).unwrap(), r#"{"confidence": 0.75}"#);
    }

    #[test]
    fn extract_with_prefix_text() {
        let input = "Classification:\n{\"sentiment\": \"negative\", \"confidence\": 0.6}";
        assert!(extract_json(input).unwrap().contains("negative"));
    }

    #[test]
    fn extract_ignores_braces_in_strings() {
        let input = r#"note {"sentiment": "neutral {maybe}", "confidence": 0.5} trailing"#;
        let parsed: serde_json::Value = serde_json::from_str(&extract_json(input).unwrap()).unwrap();
        assert_eq!(parsed["confidence"], 0.5);
    }

    #[test]
    fn extract_no_json() {
        assert!(extract_json("plain words only").is_err());
        assert!(extract_json("} stray {").is_err());
    }

    #[test]
    fn parse_full_reply() {
        let c = parse_classification(
            r#"{"sentiment": "Positive", "confidence": 0.7, "tickers": ["AAPL"]}"#,
        )
        .unwrap();
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert_eq!(c.confidence, dec!(0.7));
        assert_eq!(c.tickers, vec!["AAPL"]);
    }

    #[test]
    fn parse_label_alias_and_string_confidence() {
        let c = parse_classification(r#"{"label": "negative", "confidence": "0.65"}"#).unwrap();
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.confidence, dec!(0.65));
        assert!(c.tickers.is_empty());
    }

    #[test]
    fn parse_unknown_label_fails() {
        let err = parse_classification(r#"{"sentiment": "ecstatic", "confidence": 0.9}"#);
        assert!(matches!(err, Err(ClassifyError::Parse(_))));
    }

    #[test]
    fn parse_missing_confidence_fails() {
        let err = parse_classification(r#"{"sentiment": "neutral"}"#);
        assert!(matches!(err, Err(ClassifyError::Parse(_))));
    }
}

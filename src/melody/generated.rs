//! Parsing of generated-melody responses
//!
//! A generator may answer with a bare melody object, an `{output, melody}`
//! envelope, an array of either, or plain text. The answer is often
//! wrapped in a markdown code fence.

use serde_json::Value;
use tracing::{debug, warn};

use super::Melody;

/// Result of parsing a generated response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generated {
    /// Prose that came with (or instead of) the melody
    pub output: Option<String>,
    pub melody: Option<Melody>,
}

/// Remove a leading "```" or "```json" fence line and a trailing "```"
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        body = rest.trim_start();
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest.trim_end();
    }
    body
}

/// Extract a melody from a generated response; anything unparseable is
/// returned as plain output text
pub fn parse_generated(text: &str) -> Generated {
    let body = strip_code_fence(text);

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            debug!("response is not JSON ({}), treating as text", e);
            return Generated {
                output: Some(text.trim().to_string()),
                melody: None,
            };
        }
    };

    let value = match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Generated::default(),
        },
        other => other,
    };

    let Value::Object(mut fields) = value else {
        return Generated {
            output: Some(body.to_string()),
            melody: None,
        };
    };

    let output = match fields.remove("output") {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };

    let candidate = match fields.remove("melody") {
        Some(inner) => Some(inner),
        None if fields.contains_key("notes") => Some(Value::Object(fields)),
        None => None,
    };

    let melody = candidate.and_then(|v| match serde_json::from_value::<Melody>(v) {
        Ok(melody) => Some(melody),
        Err(e) => {
            warn!("ignoring malformed melody in response: {}", e);
            None
        }
    });

    Generated { output, melody }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MELODY: &str =
        r#"{"name": "Tune", "tempo": 300, "notes": [{"note": "C4", "duration": 1}]}"#;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_bare_melody() {
        let parsed = parse_generated(MELODY);
        assert_eq!(parsed.output, None);
        assert_eq!(parsed.melody.map(|m| m.name), Some("Tune".to_string()));
    }

    #[test]
    fn test_envelope_with_output() {
        let text = format!("```json\n{{\"output\": \"Here you go\", \"melody\": {}}}\n```", MELODY);
        let parsed = parse_generated(&text);
        assert_eq!(parsed.output.as_deref(), Some("Here you go"));
        assert!(parsed.melody.is_some());
    }

    #[test]
    fn test_array_takes_first() {
        let text = format!("[{}, {{\"output\": \"second\"}}]", MELODY);
        let parsed = parse_generated(&text);
        assert_eq!(parsed.melody.map(|m| m.tempo), Some(300.0));
    }

    #[test]
    fn test_plain_text() {
        let parsed = parse_generated("I can't write a melody about that.");
        assert_eq!(parsed.output.as_deref(), Some("I can't write a melody about that."));
        assert_eq!(parsed.melody, None);
    }

    #[test]
    fn test_output_only() {
        let parsed = parse_generated(r#"{"output": "no tune today"}"#);
        assert_eq!(parsed.output.as_deref(), Some("no tune today"));
        assert_eq!(parsed.melody, None);
    }

    #[test]
    fn test_malformed_melody_keeps_output() {
        let parsed = parse_generated(
            r#"{"output": "oops", "melody": {"name": "X", "tempo": 300, "notes": [{"note": "H2"}]}}"#,
        );
        assert_eq!(parsed.output.as_deref(), Some("oops"));
        assert_eq!(parsed.melody, None);
    }
}

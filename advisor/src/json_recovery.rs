//! Lenient JSON extraction from model output.
//!
//! Models wrap JSON in code fences, prepend prose, leave trailing commas or
//! emit several objects back to back. The first pass slices the outermost
//! braces and parses strictly; the second pass repairs the common defects.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

fn trailing_comma_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern is valid"))
}

fn adjacent_objects_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\}\s*\{").expect("adjacent objects pattern is valid"))
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    match text.find("```") {
        Some(open) => {
            let after = &text[open + 3..];
            // Skip the language tag on the fence line
            let body = after.find('\n').map_or(after, |nl| &after[nl + 1..]);
            match body.find("```") {
                Some(close) => &body[..close],
                None => body,
            }
        }
        None => text,
    }
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn repair(candidate: &str) -> String {
    let without_comments: String = candidate
        .lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n");
    let without_trailing = trailing_comma_regex().replace_all(&without_comments, "$1");
    adjacent_objects_regex()
        .replace_all(&without_trailing, "},{")
        .into_owned()
}

/// Extract the first JSON object found in `text`
///
/// Returns `None` when neither the strict nor the repaired pass yields an
/// object. Several adjacent objects are merged into one, later keys winning.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let body = strip_code_fences(text);
    let candidate = outer_braces(body).or_else(|| outer_braces(text))?;

    if let Some(map) = parse_object(candidate) {
        return Some(map);
    }

    let repaired = repair(candidate);
    if let Some(map) = parse_object(&repaired) {
        return Some(map);
    }

    // Back-to-back objects become an array, folded into a single object
    match serde_json::from_str::<Value>(&format!("[{repaired}]")) {
        Ok(Value::Array(items)) => {
            let mut merged = Map::new();
            for item in items {
                if let Value::Object(map) = item {
                    merged.extend(map);
                }
            }
            (!merged.is_empty()).then_some(merged)
        }
        _ => {
            tracing::warn!("Could not recover JSON from model output");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object() {
        let map = extract_json_object(r#"{"tasks": []}"#).unwrap();
        assert_eq!(map["tasks"], json!([]));
    }

    #[test]
    fn test_fenced_object_with_prose() {
        let text = "Here is the plan:\n```json\n{\"tasks\": [{\"title\": \"Plough\"}]}\n```\nGood luck!";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["tasks"][0]["title"], "Plough");
    }

    #[test]
    fn test_trailing_commas_and_comments() {
        let text = r#"{
            // generated
            "tasks": [
                {"title": "Sow", "duration": 4,},
            ],
        }"#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["tasks"][0]["duration"], 4);
    }

    #[test]
    fn test_adjacent_objects_are_merged() {
        let text = r#"{"a": 1} {"b": 2}"#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);
    }

    #[test]
    fn test_no_object() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }
}

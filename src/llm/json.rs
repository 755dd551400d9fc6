use serde_json::Value;
use crate::errors::ReverieError;

/// Pull a JSON document out of a model reply.
///
/// Tries, in order: the raw text, the text with markdown fences removed,
/// the outermost `{...}` span, and finally that span with truncated
/// brackets closed.
pub fn parse_json_response(text: &str, provider: &str) -> Result<Value, ReverieError> {
    if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(v);
    }

    let stripped = strip_code_fences(text);
    if let Ok(v) = serde_json::from_str::<Value>(stripped) {
        return Ok(v);
    }

    let Some(candidate) = extract_json(stripped) else {
        return Err(ReverieError::OutputValidation(format!(
            "No JSON object in {} response", provider
        )));
    };
    match serde_json::from_str::<Value>(candidate) {
        Ok(v) => Ok(v),
        Err(e) => repair_truncated_json(candidate)
            .and_then(|repaired| serde_json::from_str::<Value>(&repaired).ok())
            .ok_or_else(|| ReverieError::OutputValidation(format!(
                "JSON parse error in {} response: {}", provider, e
            ))),
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"));
    match without_open {
        Some(rest) => rest.trim().strip_suffix("```").unwrap_or(rest).trim(),
        None => trimmed,
    }
}

/// Outermost `{ ... }` span, or from the first `{` to the end when the
/// reply was cut off before closing.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    match text.rfind('}') {
        Some(end) if end > start => Some(&text[start..=end]),
        _ => Some(&text[start..]),
    }
}

/// Close brackets left open by a truncated reply.
///
/// Cuts back to the last complete value, then closes still-open containers
/// innermost first. Returns `None` when nothing needed closing.
pub fn repair_truncated_json(text: &str) -> Option<String> {
    let last_close = text.rfind(['}', ']'])?;
    let mut s = text[..=last_close].trim_end().to_string();

    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in s.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    if stack.is_empty() || in_string {
        return None;
    }
    while let Some(close) = stack.pop() {
        s.push(close);
    }
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let v = parse_json_response(r#"{"a": 1}"#, "test").unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn test_fenced_json() {
        let v = parse_json_response("```json\n{\"a\": [1, 2]}\n```", "test").unwrap();
        assert_eq!(v["a"][1], 2);
    }

    #[test]
    fn test_json_with_prose() {
        let v = parse_json_response("Here is the plan:\n{\"steps\": []}\nGood luck.", "test").unwrap();
        assert!(v["steps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_truncated_array_is_repaired() {
        let text = r#"{"steps": [{"action": "a", "tool": "file"}, {"action": "b", "tool": "str"#;
        let v = parse_json_response(text, "test").unwrap();
        assert_eq!(v["steps"].as_array().unwrap().len(), 1);
        assert_eq!(v["steps"][0]["tool"], "file");
    }

    #[test]
    fn test_repair_respects_brackets_inside_strings() {
        let repaired = repair_truncated_json(r#"{"notes": ["a}b", {"x": 1}"#).unwrap();
        let v: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(v["notes"][0], "a}b");
    }

    #[test]
    fn test_no_json_is_validation_error() {
        let err = parse_json_response("I cannot help with that.", "groq").unwrap_err();
        assert!(matches!(err, ReverieError::OutputValidation(_)));
    }
}

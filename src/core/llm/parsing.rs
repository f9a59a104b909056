//! Normalization of model response envelopes. Models wrap structured output
//! in varying textual envelopes (fenced code blocks, bare JSON, a JSON
//! array around a single object); callers here see either a plain JSON
//! object or an `LlmResponse` error.

use serde_json::Value;

use crate::error::AppError;

/// Strips a fenced block (```json ... ``` or ``` ... ```) down to its body,
/// or returns the trimmed input when no fence is present.
fn strip_fences(content: &str) -> &str {
    for marker in ["```json", "```"] {
        if let Some(start) = content.find(marker) {
            let body = &content[start + marker.len()..];
            if let Some(end) = body.find("```") {
                return body[..end].trim();
            }
        }
    }
    content.trim()
}

/// Extracts one JSON object from a model response, unwrapping a
/// single-element array envelope if present.
pub fn extract_json_object(content: &str) -> Result<Value, AppError> {
    let payload = strip_fences(content);
    let parsed: Value = serde_json::from_str(payload)
        .map_err(|e| AppError::LlmResponse(format!("response is not valid JSON: {}", e)))?;

    let object = match parsed {
        Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    };

    if object.is_object() {
        Ok(object)
    } else {
        Err(AppError::LlmResponse(format!(
            "expected a JSON object, got {}",
            type_name(&object)
        )))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Pulls source code out of a response that may wrap it in a language
/// fence. Tries React-flavored fences first, then any fence, then the raw
/// text.
pub fn extract_code(content: &str) -> String {
    for lang in ["jsx", "tsx", "javascript", "typescript", "react"] {
        let marker = format!("```{}", lang);
        if let Some(start) = content.find(&marker) {
            let body = &content[start + marker.len()..];
            if let Some(end) = body.find("```") {
                return body[..end].trim().to_string();
            }
        }
    }
    if let Some(start) = content.find("```") {
        let body = &content[start + 3..];
        // Skip a language tag on the fence line.
        let body = match body.find('\n') {
            Some(newline) if body[..newline].len() <= 16 => &body[newline + 1..],
            _ => body,
        };
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }
    content.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_json() {
        let value = extract_json_object(r#"{"query": "SELECT 1"}"#).unwrap();
        assert_eq!(value["query"], json!("SELECT 1"));
    }

    #[test]
    fn parses_json_fence() {
        let content = "Here you go:\n```json\n{\"chart_type\": \"bar\"}\n```\nEnjoy!";
        let value = extract_json_object(content).unwrap();
        assert_eq!(value["chart_type"], json!("bar"));
    }

    #[test]
    fn parses_generic_fence() {
        let content = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(content).unwrap()["a"], json!(1));
    }

    #[test]
    fn unwraps_single_element_array() {
        let value = extract_json_object(r#"[{"a": 1}]"#).unwrap();
        assert_eq!(value["a"], json!(1));
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(matches!(
            extract_json_object("\"just a string\""),
            Err(AppError::LlmResponse(_))
        ));
        assert!(matches!(
            extract_json_object("not json at all"),
            Err(AppError::LlmResponse(_))
        ));
    }

    #[test]
    fn extracts_react_code_fences() {
        let content = "Sure:\n```jsx\nexport default function Dashboard() {}\n```";
        assert_eq!(
            extract_code(content),
            "export default function Dashboard() {}"
        );
    }

    #[test]
    fn extract_code_falls_back_to_raw_text() {
        assert_eq!(extract_code("  const x = 1;  "), "const x = 1;");
    }
}

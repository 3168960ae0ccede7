//! Recovery of JSON objects embedded in free-text model answers.

use std::sync::LazyLock;

use regex::Regex;

// Greedy: first `{` through last `}`.
static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Extract the outermost JSON object from `text`, if one parses.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let candidate = JSON_OBJECT.find(text)?;
    match serde_json::from_str::<serde_json::Value>(candidate.as_str()) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "free-text answer contained unparseable JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_object() {
        let text = "Sure! Here you go:\n```json\n{\"food\": \"progress\",\n \"toxic\": \"constant\"}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["food"], "progress");
        assert_eq!(value["toxic"], "constant");
    }

    #[test]
    fn nested_objects_are_kept_whole() {
        let value = extract_json(r#"result: {"a": {"b": 1}} done"#).unwrap();
        assert_eq!(value["a"]["b"], 1);
    }

    #[test]
    fn no_object_yields_none() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{not json}").is_none());
        assert!(extract_json("").is_none());
    }
}

//! Cleanup of generative JSON output before it is parsed.

use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("code fence regex"));

/// Contents of the first Markdown code block, or the trimmed input when there is none.
pub fn strip_code_fences(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Slice from the first `{` to the last `}` so surrounding prose is dropped.
pub fn outermost_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Slice from the first `[` to the last `]`.
pub fn outermost_array(text: &str) -> &str {
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Drop commas that directly precede `]` or `}`. String literals are left untouched.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// All repairs, in order. Comma cleanup only runs when the extracted text does not already parse.
pub fn repair_model_json(raw: &str) -> String {
    repair_candidate(outermost_object(strip_code_fences(raw)))
}

/// Same repairs for a top-level JSON array.
pub fn repair_model_json_array(raw: &str) -> String {
    repair_candidate(outermost_array(strip_code_fences(raw)))
}

fn repair_candidate(candidate: &str) -> String {
    if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
        return candidate.to_string();
    }
    remove_trailing_commas(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "Sure!\n```\n{\"a\": 1}\n```\nHope that helps.";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn unfenced_input_is_trimmed() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn drops_surrounding_prose() {
        assert_eq!(
            outermost_object("Here you go: {\"a\": {\"b\": 1}} done"),
            "{\"a\": {\"b\": 1}}"
        );
    }

    #[test]
    fn removes_trailing_commas() {
        let fixed = remove_trailing_commas("{\"a\": [\"x\", \"y\",], \"b\": {\"c\": 1,\n},}");
        assert_eq!(fixed, "{\"a\": [\"x\", \"y\"], \"b\": {\"c\": 1\n}}");
        assert!(serde_json::from_str::<serde_json::Value>(&fixed).is_ok());
    }

    #[test]
    fn commas_inside_strings_survive() {
        let fixed = remove_trailing_commas(r#"{"a, ]": ["x, }", "y",],}"#);
        assert_eq!(fixed, r#"{"a, ]": ["x, }", "y"]}"#);

        let escaped = remove_trailing_commas(r#"["say \",]\"",]"#);
        assert_eq!(escaped, r#"["say \",]\""]"#);
    }

    #[test]
    fn valid_json_is_not_rewritten() {
        let raw = r#"{"concept_map": {"a, ]": {"is": ["b"]}}}"#;
        assert_eq!(repair_model_json(raw), raw);
    }

    #[test]
    fn array_repair_cuts_to_brackets() {
        let raw = "Key concepts:\n[\"photosynthesis\", \"ATP\",]\nThanks";
        let fixed = repair_model_json_array(raw);
        assert_eq!(fixed, "[\"photosynthesis\", \"ATP\"]");
    }
}

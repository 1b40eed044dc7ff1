//! JSON parsing utilities for the TCAD API client.

use anyhow::Result;

/// Window of body text shown around a parse error.
const SNIPPET_WIDTH: usize = 80;

/// Attempt to parse JSON and, on failure, include a contextual snippet of the
/// line where the error occurred. This prevents dumping huge response bodies
/// into logs; upstream pages can run to megabytes.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    match serde_json::from_str::<T>(body) {
        Ok(value) => Ok(value),
        Err(err) => {
            let (line, column) = (err.line(), err.column());
            let snippet = error_snippet(body, line, column);
            Err(anyhow::anyhow!(
                "{err} at line {line}, column {column}\nSnippet:\n{snippet}",
            ))
        }
    }
}

/// Build a `...context...` window with a caret under the failing column.
/// Slicing is clamped to char boundaries so multi-byte content can't panic.
fn error_snippet(body: &str, line: usize, column: usize) -> String {
    let Some(target_line) = body.lines().nth(line.saturating_sub(1)) else {
        return "(no such line)".to_string();
    };
    if target_line.is_empty() {
        return "(empty line)".to_string();
    }

    // serde's column is 1-based
    let error_idx = column.saturating_sub(1).min(target_line.len());
    let half = SNIPPET_WIDTH / 2;
    let mut start = error_idx.saturating_sub(half);
    let mut end = (error_idx + half).min(target_line.len());
    while start > 0 && !target_line.is_char_boundary(start) {
        start -= 1;
    }
    while end < target_line.len() && !target_line.is_char_boundary(end) {
        end += 1;
    }

    let caret = " ".repeat(error_idx - start) + "^";
    format!("...{}...\n   {caret}", &target_line[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize, Debug)]
    struct Probe {
        #[allow(dead_code)]
        value: i32,
    }

    #[test]
    fn parse_valid_json() {
        let result: Result<Probe> = parse_json_with_context(r#"{"value": 3}"#);
        assert!(result.is_ok());
    }

    #[test]
    fn parse_error_includes_snippet() {
        let result: Result<Probe> = parse_json_with_context(r#"{"value": }"#);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("Snippet"));
        assert!(message.contains("^"));
    }

    #[test]
    fn snippet_survives_multibyte_content() {
        let body = format!(r#"{{"value": "{}"#, "ü".repeat(200));
        let result: Result<Probe> = parse_json_with_context(&body);
        assert!(result.is_err());
    }
}

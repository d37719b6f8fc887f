use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("valid fence pattern"));

/// Body of the first fenced block, or the trimmed text when unfenced.
/// An unterminated opening fence is dropped along with its language tag.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if let Some(caps) = FENCED_BLOCK.captures(trimmed) {
        return caps[1].trim().to_string();
    }

    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_end().trim_end_matches("```");
        let body = match rest.split_once('\n') {
            Some((_tag, body)) => body,
            None => rest,
        };
        return body.trim().to_string();
    }

    trimmed.to_string()
}

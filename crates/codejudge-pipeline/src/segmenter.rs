use codejudge_core::CASE_DELIMITER;

/// Splits driver stdout into per-case outputs. Segments are trimmed and
/// empty ones dropped, so `len()` may differ from the requested case count.
pub fn segment(stdout: &str) -> Vec<String> {
    segment_with(stdout, CASE_DELIMITER)
}

pub fn segment_with(stdout: &str, delimiter: &str) -> Vec<String> {
    stdout
        .split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

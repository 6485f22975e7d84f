//! Sequential transaction codes such as `GRN-42`

/// Prefix of a code description: the text before the first `-`
pub fn code_prefix(description: &str) -> &str {
    description.split('-').next().unwrap_or_default().trim()
}

/// Render a code from its prefix and sequence value
pub fn format_code(prefix: &str, value: i64) -> String {
    format!("{}-{}", prefix, value)
}

/// Numeric suffix of a code, if it has one
pub fn parse_code_suffix(code: &str) -> Option<i64> {
    code.split_once('-')
        .and_then(|(_, suffix)| suffix.parse::<i64>().ok())
}

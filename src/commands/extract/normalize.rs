use super::*;

pub(super) fn replace_characters(text: &str, mapping: &[(String, String)]) -> String {
    let mut out = text.to_string();
    for (from, to) in mapping {
        if out.contains(from.as_str()) {
            out = out.replace(from.as_str(), to);
        }
    }
    out
}

pub(super) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Rejoins words broken across lines, which come out as `wordpart1- wordpart2`.
/// Only applies between lowercase letters so `you- Bought` style dashes stay.
pub(super) fn remove_line_hyphenation(text: &str, hyphen_break: &Regex) -> String {
    let mut out = text.to_string();
    while hyphen_break.is_match(&out) {
        out = hyphen_break.replace_all(&out, "$1$2").into_owned();
    }
    out
}

pub(super) fn normalize_text<S: AsRef<str>>(parts: &[S], config: &ExtractConfig) -> String {
    let joined = parts
        .iter()
        .map(|part| part.as_ref())
        .collect::<Vec<&str>>()
        .join(" ");
    let mapped = replace_characters(&joined, &config.character_map);
    let collapsed = collapse_whitespace(&mapped);
    remove_line_hyphenation(&collapsed, config.hyphen_break())
}

pub(super) fn normalize_optional<S: AsRef<str>>(parts: &[S], config: &ExtractConfig) -> Option<String> {
    Some(normalize_text(parts, config)).filter(|text| !text.is_empty())
}

/// Parses a count column such as `12,345`.
pub(super) fn parse_count(raw: &str, column: &str, location: SourceLocation) -> Result<u64> {
    let digits = raw.trim().replace(',', "");
    digits.parse::<u64>().with_context(|| {
        format!("input format error: invalid {column} value {raw:?} at {location}")
    })
}

pub(super) fn parse_percent(raw: &str, location: SourceLocation) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("input format error: invalid percent value {raw:?} at {location}"))
}

//! Metadata extraction for uploaded post text.
//!
//! Posts carry their metadata inline as directive lines of the form
//! `=: <key> <value>`. Recognised keys are `title`, `description` and
//! `publish_at`; everything else stays part of the body.

use time::{
    Date, OffsetDateTime, format_description::FormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};

const DIRECTIVE_PREFIX: &str = "=:";

const PUBLISH_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub publish_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedText {
    pub metadata: PostMetadata,
    pub lines: Vec<String>,
}

/// Split raw post text into metadata directives and body lines.
pub fn parse_text(text: &str) -> ParsedText {
    let mut parsed = ParsedText::default();

    for line in text.lines() {
        match parse_directive(line) {
            Some((key, value)) => apply_directive(&mut parsed.metadata, key, value),
            None => parsed.lines.push(line.to_string()),
        }
    }

    parsed
}

fn parse_directive(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix(DIRECTIVE_PREFIX)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Some((key, value.trim()))
}

fn apply_directive(metadata: &mut PostMetadata, key: &str, value: &str) {
    match key.to_ascii_lowercase().as_str() {
        "title" => metadata.title = non_empty(value),
        "description" => metadata.description = non_empty(value),
        "publish_at" => {
            if let Some(publish_at) = parse_publish_at(value) {
                metadata.publish_at = Some(publish_at);
            }
        }
        _ => {}
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Accepts either a calendar date (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_publish_at(value: &str) -> Option<OffsetDateTime> {
    if let Ok(date) = Date::parse(value, PUBLISH_DATE_FORMAT) {
        return Some(date.midnight().assume_utc());
    }
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment extraction failures and validation findings into miette
//! diagnostics, with "did you mean" hints for misspelled keys and event names.

#![allow(unused_assignments)] // emitted by the miette Diagnostic derive

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a candidate must beat to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(wagate::config::unknown_key),
        help("{}", hint(suggestion.as_deref(), "valid keys", valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(wagate::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(wagate::config::missing_key),
        help("add `{key} = ...` to wagate.toml")
    )]
    MissingKey { key: String },

    /// An entry in `webhooks.events` that names no event type.
    #[error("webhook for session `{session_id}` subscribes to unknown event `{name}`")]
    #[diagnostic(
        code(wagate::config::unknown_event),
        help("{}", hint(suggestion.as_deref(), "known events", known))
    )]
    UnknownEvent {
        session_id: String,
        name: String,
        suggestion: Option<String>,
        known: String,
    },

    #[error("invalid value: {message}")]
    #[diagnostic(code(wagate::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(wagate::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

fn hint(suggestion: Option<&str>, label: &str, candidates: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {label}: {candidates}"),
        None => format!("{label}: {candidates}"),
    }
}

/// Split a figment error into one diagnostic per underlying failure.
///
/// `sources` pairs a file path (or `<inline>`) with its contents and is used
/// to point unknown-key diagnostics at the offending line.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.clone();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let suggestion = suggest(field, expected.iter().copied());
                    let (span, src) = locate(&error, &path, field, sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion,
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: qualified(&path, field),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: path.join("."),
                    detail: format!("found {actual}"),
                    expected: expected.clone(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn qualified(path: &[String], field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", path.join("."))
    }
}

fn locate(
    error: &figment::Error,
    path: &[String],
    field: &str,
    sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let origin = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(file)) => file.display().to_string(),
        _ => "<inline>".to_string(),
    };
    let Some((name, content)) = sources.iter().find(|(name, _)| *name == origin) else {
        return (None, None);
    };
    match find_key_offset(content, path, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` at the start of a line, searched after the header
/// of the first table in `path` (`[hub]` or `[[webhooks]]`).
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        None => 0,
        Some(table) => {
            let array = format!("[[{table}]]");
            let plain = format!("[{table}]");
            let (pos, len) = content
                .find(&array)
                .map(|p| (p, array.len()))
                .or_else(|| content.find(&plain).map(|p| (p, plain.len())))?;
            pos + len
        }
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if let Some(rest) = line.trim_start().strip_prefix(field) {
            if rest.trim_start().starts_with('=') {
                return Some(offset + indent);
            }
        }
        offset += line.len();
    }
    None
}

/// Closest candidate to `unknown` by Jaro-Winkler similarity, if close enough.
pub fn suggest<'a>(unknown: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    candidates
        .into_iter()
        .map(|c| (strsim::jaro_winkler(unknown, c), c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Render diagnostics to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key() {
        let keys = ["shared_key", "auth_timeout_secs", "ping_interval_secs"];
        assert_eq!(suggest("shared_kye", keys), Some("shared_key".into()));
        assert_eq!(suggest("ping_intervl_secs", keys), Some("ping_interval_secs".into()));
    }

    #[test]
    fn no_suggestion_for_unrelated_word() {
        assert_eq!(suggest("zzzz", ["host", "port"]), None);
    }

    #[test]
    fn key_offset_in_table() {
        let content = "[server]\nport = 1\n\n[hub]\n  shared_kye = \"x\"\n";
        let offset = find_key_offset(content, &["hub".to_string()], "shared_kye").unwrap();
        assert_eq!(&content[offset..offset + 10], "shared_kye");
    }

    #[test]
    fn key_offset_in_array_of_tables() {
        let content = "[[webhooks]]\nsession_id = \"s1\"\nurll = \"http://x\"\n";
        let offset = find_key_offset(content, &["webhooks".to_string()], "urll").unwrap();
        assert_eq!(&content[offset..offset + 4], "urll");
    }

    #[test]
    fn key_prefix_is_not_a_match() {
        let content = "[hub]\nshared_key_extra = 1\n";
        assert_eq!(find_key_offset(content, &["hub".to_string()], "shared_key"), None);
    }

    #[test]
    fn unknown_event_help_names_candidate() {
        let err = ConfigError::UnknownEvent {
            session_id: "s1".into(),
            name: "message.recieved".into(),
            suggestion: Some("message.received".into()),
            known: "message.received, message.sent".into(),
        };
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.starts_with("did you mean `message.received`?"));
    }
}

//! Splits a leading YAML metadata block from a Markdown document.
//!
//! Front matter is advisory: anything that does not parse cleanly leaves the
//! document untouched and yields [`FrontMatter::Unparsed`].

use tracing::{debug, warn};

use crate::domain::metadata::Metadata;

#[derive(Debug, Clone, PartialEq)]
pub enum FrontMatter {
    /// A delimited YAML mapping was found and decoded.
    Parsed { metadata: Metadata, body: String },
    /// No usable block; `body` is the raw input verbatim.
    Unparsed { body: String },
}

impl FrontMatter {
    pub fn body(&self) -> &str {
        match self {
            Self::Parsed { body, .. } | Self::Unparsed { body } => body,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }

    /// Collapses both branches into `(metadata, body)`; unparsed input has
    /// empty metadata.
    pub fn into_parts(self) -> (Metadata, String) {
        match self {
            Self::Parsed { metadata, body } => (metadata, body),
            Self::Unparsed { body } => (Metadata::new(), body),
        }
    }
}

pub fn parse(raw: &str) -> FrontMatter {
    let unparsed = || FrontMatter::Unparsed {
        body: raw.to_string(),
    };

    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut lines = text.split_inclusive('\n');

    let Some(opening) = lines.next() else {
        return unparsed();
    };
    if !opening.ends_with('\n') || !is_delimiter(opening) {
        return unparsed();
    }

    let yaml_start = opening.len();
    let mut offset = yaml_start;
    let mut block = None;
    for line in lines {
        if is_delimiter(line) {
            block = Some((&text[yaml_start..offset], &text[offset + line.len()..]));
            break;
        }
        offset += line.len();
    }

    let Some((yaml, rest)) = block else {
        debug!(
            target = "application::front_matter",
            op = "parse",
            "front matter block is not terminated; treating input as body"
        );
        return unparsed();
    };

    if yaml.trim().is_empty() {
        return FrontMatter::Parsed {
            metadata: Metadata::new(),
            body: tidy_body(rest),
        };
    }

    let metadata = match serde_yaml_ng::from_str::<serde_yaml_ng::Value>(yaml) {
        Ok(serde_yaml_ng::Value::Mapping(mapping)) => Metadata::from_yaml_mapping(mapping),
        Ok(serde_yaml_ng::Value::Null) => Metadata::new(),
        Ok(other) => {
            warn!(
                target = "application::front_matter",
                op = "parse",
                kind = yaml_kind(&other),
                "front matter is not a mapping; ignoring it"
            );
            return unparsed();
        }
        Err(err) => {
            warn!(
                target = "application::front_matter",
                op = "parse",
                error = %err,
                "front matter failed to parse; ignoring it"
            );
            return unparsed();
        }
    };

    FrontMatter::Parsed {
        metadata,
        body: tidy_body(rest),
    }
}

fn tidy_body(rest: &str) -> String {
    rest.trim_start_matches(['\r', '\n']).trim_end().to_string()
}

/// A fence is a line of three or more dashes, on its own.
fn is_delimiter(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.len() >= 3 && trimmed.bytes().all(|b| b == b'-')
}

fn yaml_kind(value: &serde_yaml_ng::Value) -> &'static str {
    use serde_yaml_ng::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

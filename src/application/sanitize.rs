//! Input hygiene: filenames, front-matter metadata and raw content.
//!
//! Every function here is pure apart from logging. Filenames and metadata are
//! rewritten into a safe form and never rejected; content is either accepted
//! or rejected with a [`ValidationError`].

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::domain::error::ValidationError;
use crate::domain::metadata::{MetaValue, Metadata};

pub const FALLBACK_FILENAME: &str = "unnamed.md";
pub const MAX_FILENAME_LEN: usize = 255;
pub const MAX_KEY_LEN: usize = 50;
pub const MAX_VALUE_LEN: usize = 500;
pub const MAX_LIST_ITEMS: usize = 10;
pub const MAX_LIST_ITEM_LEN: usize = 100;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

static JS_SCHEME: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"javascript:")
        .case_insensitive(true)
        .build()
        .expect("scheme pattern is valid")
});

static KEY_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("key pattern is valid"));

static UNDERSCORE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_{2,}").expect("underscore pattern is valid"));

/// Logged when present, never rejected: rendering escapes raw HTML anyway.
static SUSPICIOUS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        r"<script[^>]*>",
        r"javascript:",
        r"onerror=",
        r"onload=",
        r"eval\(",
        r"exec\(",
    ]
    .into_iter()
    .map(|pattern| {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("suspicious pattern is valid");
        (pattern, regex)
    })
    .collect()
});

/// Rewrites an untrusted filename into `[A-Za-z0-9_.-]+`, at most 255
/// characters, keeping the extension when truncating.
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');
    let mut safe = UNDERSCORE_RUN.replace_all(trimmed, "_").into_owned();

    if safe.len() > MAX_FILENAME_LEN {
        safe = truncate_keeping_extension(&safe, MAX_FILENAME_LEN);
    }

    if safe.is_empty() || safe == "." {
        safe = FALLBACK_FILENAME.to_string();
    }

    debug!(
        target = "application::sanitize",
        op = "filename",
        original = name,
        sanitized = %safe,
    );
    safe
}

fn truncate_keeping_extension(name: &str, max: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 1 < max => {
            let keep = max - ext.len() - 1;
            format!("{}.{ext}", &stem[..keep.min(stem.len())])
        }
        _ => name[..max].to_string(),
    }
}

/// True when `name` has an extension contained (case-insensitively) in `allowed`.
pub fn has_allowed_extension<S: AsRef<str>>(name: &str, allowed: &[S]) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    allowed
        .iter()
        .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(ext))
}

/// Neutralizes every key and value of a metadata mapping.
///
/// Keys are mapped onto `[A-Za-z0-9_-]{1,50}`; keys that end up empty are
/// dropped. Later keys that collapse onto an earlier key replace its value.
pub fn sanitize_metadata(metadata: &Metadata) -> Metadata {
    let mut sanitized = Metadata::new();

    for (key, value) in metadata.iter() {
        let clean_key = sanitize_key(key);
        if clean_key.is_empty() {
            debug!(
                target = "application::sanitize",
                op = "metadata",
                "dropping empty metadata key"
            );
            continue;
        }
        sanitized.insert(clean_key, sanitize_value(value));
    }

    sanitized
}

fn sanitize_key(key: &str) -> String {
    let replaced = KEY_DISALLOWED.replace_all(key, "_");
    truncate_chars(&replaced, MAX_KEY_LEN)
}

fn sanitize_value(value: &MetaValue) -> MetaValue {
    match value {
        MetaValue::Bool(_) | MetaValue::Integer(_) | MetaValue::Float(_) => value.clone(),
        MetaValue::Null => MetaValue::String(String::new()),
        MetaValue::String(text) => MetaValue::String(clean_text(text, MAX_VALUE_LEN)),
        MetaValue::List(items) => MetaValue::List(
            items
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(|item| MetaValue::String(clean_text(&item.to_string(), MAX_LIST_ITEM_LEN)))
                .collect(),
        ),
        MetaValue::Map(nested) => MetaValue::Map(sanitize_metadata(nested)),
    }
}

/// Strips tag-like substrings and `javascript:` schemes, then truncates.
fn clean_text(text: &str, max_chars: usize) -> String {
    let mut cleaned = TAG.replace_all(text, "").into_owned();
    // Removal can splice a new scheme together (`javajavascript:script:`).
    while JS_SCHEME.is_match(&cleaned) {
        cleaned = JS_SCHEME.replace_all(&cleaned, "").into_owned();
    }
    truncate_chars(&cleaned, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Checks raw upload bytes and returns them as text.
///
/// Size is checked first so oversized binaries are reported as too large.
pub fn validate_bytes(raw: &[u8], max_size: usize) -> Result<&str, ValidationError> {
    if raw.len() > max_size {
        return Err(ValidationError::ContentTooLarge {
            size: raw.len(),
            max: max_size,
        });
    }
    if raw.contains(&0) {
        return Err(ValidationError::BinaryContentDetected);
    }
    let text = std::str::from_utf8(raw).map_err(|_| ValidationError::InvalidEncoding)?;
    validate_content(text, max_size)?;
    Ok(text)
}

/// Rejects oversized or binary text. Suspicious patterns are only logged.
pub fn validate_content(content: &str, max_size: usize) -> Result<(), ValidationError> {
    let size = content.len();
    if size > max_size {
        return Err(ValidationError::ContentTooLarge {
            size,
            max: max_size,
        });
    }

    if content.contains('\0') {
        return Err(ValidationError::BinaryContentDetected);
    }

    for (pattern, regex) in SUSPICIOUS.iter() {
        if regex.is_match(content) {
            warn!(
                target = "application::sanitize",
                op = "validate_content",
                pattern = *pattern,
                "suspicious pattern detected in content"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    /// Mixes safe characters with separators, control bytes, markup and
    /// multi-byte text.
    const ALPHABET: [char; 24] = [
        'a', 'Z', '7', '.', '_', '-', ' ', '\t', '/', '\\', '\0', ':', '<', '>', '*', '%',
        '\n', 'é', 'ß', '日', '🚀', '\u{202e}', '\u{feff}', 'ﬁ',
    ];

    static SAFE_FILENAME: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,255}$").expect("filename property"));
    static SAFE_KEY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,50}$").expect("key property"));

    /// Every one- and two-character string over [`ALPHABET`], then seeded
    /// random strings long enough to hit every length cap.
    fn generated_inputs() -> Vec<String> {
        let mut inputs = vec![String::new()];
        for first in ALPHABET {
            inputs.push(first.to_string());
            for second in ALPHABET {
                inputs.push([first, second].iter().collect());
            }
        }

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let len = rng.gen_range(0..700);
            inputs.push(
                (0..len)
                    .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
                    .collect(),
            );
        }
        inputs
    }

    fn is_safe_filename(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= MAX_FILENAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    }

    #[test]
    fn sanitize_filename_strips_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("my document.md"), "my_document.md");
        assert_eq!(sanitize_filename("a\\b\\c.md"), "a_b_c.md");
    }

    #[test]
    fn sanitize_filename_collapses_whitespace_and_underscores() {
        assert_eq!(sanitize_filename("  report   __ final .md"), "report_final_.md");
        assert_eq!(sanitize_filename("notes\t\n2024.md"), "notes_2024.md");
    }

    #[test]
    fn sanitize_filename_transliterates_accents() {
        assert_eq!(sanitize_filename("résumé.md"), "resume.md");
    }

    #[test]
    fn sanitize_filename_falls_back_when_empty() {
        for input in ["", ".", "..", "///", "<>?*", "日本語", "___"] {
            assert_eq!(sanitize_filename(input), FALLBACK_FILENAME, "input {input:?}");
        }
    }

    #[test]
    fn sanitize_filename_caps_length_keeping_extension() {
        let long = format!("{}.markdown", "a".repeat(400));
        let safe = sanitize_filename(&long);
        assert_eq!(safe.len(), MAX_FILENAME_LEN);
        assert!(safe.ends_with(".markdown"));
    }

    #[test]
    fn sanitize_filename_output_is_always_safe() {
        let inputs = [
            "../../../etc/shadow",
            "C:\\Windows\\system32\\cmd.exe",
            "name with\u{0000}null.md",
            "emoji 🚀 launch.md",
            "....hidden",
            "a/./b/../c",
            "%2e%2e%2fsecret",
            "\u{202e}gnp.md",
        ];
        for input in inputs {
            let safe = sanitize_filename(input);
            assert!(is_safe_filename(&safe), "{input:?} -> {safe:?}");
        }
    }

    #[test]
    fn sanitize_filename_holds_for_generated_names() {
        for input in generated_inputs() {
            let safe = sanitize_filename(&input);
            assert!(SAFE_FILENAME.is_match(&safe), "{input:?} -> {safe:?}");
        }
    }

    #[test]
    fn sanitize_metadata_holds_for_generated_keys_and_values() {
        let inputs = generated_inputs();
        let metadata: Metadata = inputs
            .iter()
            .map(|text| {
                let list = (0..text.chars().count() % 30)
                    .map(|_| MetaValue::String(text.clone()))
                    .collect();
                (
                    text.clone(),
                    MetaValue::Map(
                        [
                            ("text", MetaValue::String(text.clone())),
                            ("list", MetaValue::List(list)),
                        ]
                        .into_iter()
                        .collect(),
                    ),
                )
            })
            .collect();

        let clean = sanitize_metadata(&metadata);
        assert!(!clean.is_empty());
        for (key, value) in clean.iter() {
            assert!(SAFE_KEY.is_match(key), "key {key:?}");
            let MetaValue::Map(fields) = value else {
                panic!("nested map expected under {key:?}");
            };
            let text = fields.get("text").and_then(MetaValue::as_str).unwrap();
            assert!(text.chars().count() <= MAX_VALUE_LEN, "{key:?}");
            let Some(MetaValue::List(items)) = fields.get("list") else {
                panic!("list expected under {key:?}");
            };
            assert!(items.len() <= MAX_LIST_ITEMS);
            for item in items {
                assert!(item.as_str().unwrap().chars().count() <= MAX_LIST_ITEM_LEN);
            }
        }
    }

    #[test]
    fn null_values_render_as_empty_text() {
        let nested: Metadata = [("reviewer", MetaValue::Null)].into_iter().collect();
        let metadata: Metadata = [
            ("missing", MetaValue::Null),
            ("tags", MetaValue::List(vec![MetaValue::Null, "x".into()])),
            ("extra", MetaValue::Map(nested)),
        ]
        .into_iter()
        .collect();

        let clean = sanitize_metadata(&metadata);
        assert_eq!(clean.get("missing"), Some(&MetaValue::from("")));
        assert_eq!(
            clean.get("tags"),
            Some(&MetaValue::List(vec!["".into(), "x".into()]))
        );
        let Some(MetaValue::Map(inner)) = clean.get("extra") else {
            panic!("nested map expected");
        };
        assert_eq!(inner.get("reviewer"), Some(&MetaValue::from("")));
    }

    #[test]
    fn has_allowed_extension_is_case_insensitive() {
        let allowed = ["md", "markdown", "txt"];
        assert!(has_allowed_extension("doc.md", &allowed));
        assert!(has_allowed_extension("DOC.MARKDOWN", &allowed));
        assert!(!has_allowed_extension("doc.exe", &allowed));
        assert!(!has_allowed_extension("README", &allowed));
        assert!(!has_allowed_extension("archive.md.zip", &allowed));
    }

    #[test]
    fn sanitize_metadata_strips_tags_and_scripts() {
        let metadata: Metadata = [
            ("title", MetaValue::from("<script>alert(\"xss\")</script>")),
            ("link", MetaValue::from("JaVaScRiPt:alert(1)")),
            ("spliced", MetaValue::from("javajavascript:script:void(0)")),
        ]
        .into_iter()
        .collect();

        let clean = sanitize_metadata(&metadata);
        assert_eq!(clean.get("title"), Some(&MetaValue::from("alert(\"xss\")")));
        assert_eq!(clean.get("link"), Some(&MetaValue::from("alert(1)")));
        assert_eq!(clean.get("spliced"), Some(&MetaValue::from("void(0)")));
    }

    #[test]
    fn sanitize_metadata_normalizes_keys() {
        let long_key = "k".repeat(80);
        let metadata: Metadata = [
            ("due date", MetaValue::from("today")),
            ("x<y>", MetaValue::from("1")),
            ("", MetaValue::from("dropped")),
            (long_key.as_str(), MetaValue::from("long")),
        ]
        .into_iter()
        .collect();

        let clean = sanitize_metadata(&metadata);
        let keys: Vec<&str> = clean.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["due_date", "x_y_", "k".repeat(50).as_str()]);
        for key in keys {
            assert!(
                key.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            );
        }
    }

    #[test]
    fn sanitize_metadata_caps_values_and_lists() {
        let items = (0..25)
            .map(|i| MetaValue::String(format!("<b>{i}</b>{}", "x".repeat(150))))
            .collect();
        let metadata: Metadata = [
            ("summary", MetaValue::String("é".repeat(900))),
            ("tags", MetaValue::List(items)),
            ("count", MetaValue::Integer(42)),
            ("ratio", MetaValue::Float(0.5)),
            ("draft", MetaValue::Bool(true)),
            ("missing", MetaValue::Null),
        ]
        .into_iter()
        .collect();

        let clean = sanitize_metadata(&metadata);
        let summary = clean.get("summary").and_then(MetaValue::as_str).unwrap();
        assert_eq!(summary.chars().count(), MAX_VALUE_LEN);

        let MetaValue::List(tags) = clean.get("tags").unwrap() else {
            panic!("tags should stay a list");
        };
        assert_eq!(tags.len(), MAX_LIST_ITEMS);
        for tag in tags {
            let text = tag.as_str().unwrap();
            assert!(text.chars().count() <= MAX_LIST_ITEM_LEN);
            assert!(!text.contains('<'));
        }

        assert_eq!(clean.get("count"), Some(&MetaValue::Integer(42)));
        assert_eq!(clean.get("ratio"), Some(&MetaValue::Float(0.5)));
        assert_eq!(clean.get("draft"), Some(&MetaValue::Bool(true)));
        assert_eq!(clean.get("missing"), Some(&MetaValue::from("")));
    }

    #[test]
    fn sanitize_metadata_recurses_into_maps() {
        let nested: Metadata = [("bad key!", MetaValue::from("<i>x</i>"))]
            .into_iter()
            .collect();
        let metadata: Metadata = [("extra", MetaValue::Map(nested))].into_iter().collect();

        let clean = sanitize_metadata(&metadata);
        let MetaValue::Map(inner) = clean.get("extra").unwrap() else {
            panic!("nested map expected");
        };
        assert_eq!(inner.get("bad_key_"), Some(&MetaValue::from("x")));
    }

    #[test]
    fn validate_content_rejects_oversized_and_binary() {
        assert_eq!(
            validate_content("hello", 3),
            Err(ValidationError::ContentTooLarge { size: 5, max: 3 })
        );
        assert_eq!(
            validate_content("a\0b", 100),
            Err(ValidationError::BinaryContentDetected)
        );
        assert_eq!(validate_content("<script>eval(1)</script>", 100), Ok(()));
    }

    #[test]
    fn validate_content_counts_utf8_bytes() {
        // Four characters, eight bytes.
        assert!(validate_content("éééé", 7).is_err());
        assert!(validate_content("éééé", 8).is_ok());
    }

    #[test]
    fn validate_bytes_rejects_invalid_utf8() {
        assert_eq!(
            validate_bytes(&[0xff, 0xfe, b'a'], 100),
            Err(ValidationError::InvalidEncoding)
        );
        assert_eq!(validate_bytes(b"# ok", 100), Ok("# ok"));
    }
}

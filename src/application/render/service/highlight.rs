use syntect::{
    highlighting::ThemeSet,
    html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use crate::application::render::front_matter_block::escape_html;
use crate::application::render::types::EngineError;

pub(crate) const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "syntax-" };

/// Highlights a fenced block into `<pre><code>` with prefixed token classes.
pub(crate) fn highlight_block(
    language: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
) -> Result<String, EngineError> {
    let token = language
        .filter(|lang| !lang.is_empty())
        .map(str::to_ascii_lowercase);
    let syntax = token
        .as_deref()
        .and_then(|token| find_syntax(syntax_set, token))
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text());

    let mut source = code.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, CLASS_STYLE);
    for line in LinesWithEndings::from(source.as_str()) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| EngineError::Highlighting {
                language: token.clone().unwrap_or_else(|| "text".to_string()),
                message: err.to_string(),
            })?;
    }
    let highlighted = generator.finalize();

    Ok(match token {
        Some(token) => {
            let token = escape_html(&token);
            format!(
                "<pre class=\"syntax-highlight\" data-language=\"{token}\"><code class=\"language-{token}\">{highlighted}</code></pre>"
            )
        }
        None => format!("<pre class=\"syntax-highlight\"><code>{highlighted}</code></pre>"),
    })
}

/// CSS rules for the token classes emitted by [`highlight_block`]. Unknown
/// themes fall back to `InspiredGitHub`.
pub(crate) fn theme_css(theme_name: &str) -> String {
    let themes = ThemeSet::load_defaults();
    let theme = themes
        .themes
        .get(theme_name)
        .or_else(|| themes.themes.get("InspiredGitHub"));
    theme
        .and_then(|theme| css_for_theme_with_class_style(theme, CLASS_STYLE).ok())
        .unwrap_or_default()
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    syntax_set
        .find_syntax_by_token(token)
        .or_else(|| syntax_set.find_syntax_by_extension(token))
}

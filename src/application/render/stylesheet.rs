//! Print stylesheet and HTML document shell for the PDF target.

use super::front_matter_block::escape_html;

const DEFAULT_DOCUMENT_TITLE: &str = "Document";

/// Default paged-media stylesheet: A4 with 1in/0.75in margins, "Page N of M"
/// footer, the title in the running header, neither on the first page.
pub(crate) fn default_css(title: &str) -> String {
    format!(
        r#"@page {{
    size: A4;
    margin: 1in 0.75in;
    @bottom-center {{
        content: "Page " counter(page) " of " counter(pages);
        font-size: 10pt;
        color: #666;
        font-family: 'Helvetica', sans-serif;
    }}
    @top-right {{
        content: "{title}";
        font-size: 9pt;
        color: #999;
        font-family: 'Helvetica', sans-serif;
    }}
}}

@page :first {{
    @bottom-center {{ content: ""; }}
    @top-right {{ content: ""; }}
}}

body {{
    font-family: 'Georgia', serif;
    font-size: 11pt;
    line-height: 1.6;
    color: #333;
}}

h1, h2, h3, h4, h5, h6 {{
    font-family: 'Helvetica', sans-serif;
    color: #000;
    page-break-after: avoid;
}}

h1 {{ font-size: 24pt; margin-top: 0; border-bottom: 2px solid #333; padding-bottom: 10pt; }}
h2 {{ font-size: 18pt; margin-top: 20pt; border-bottom: 1px solid #999; padding-bottom: 5pt; }}
h3 {{ font-size: 14pt; margin-top: 15pt; }}

p {{ margin: 0.5em 0; text-align: justify; }}

code {{
    background-color: #f4f4f4;
    padding: 2px 4px;
    border-radius: 3px;
    font-family: 'Courier New', monospace;
    font-size: 9pt;
    color: #c7254e;
}}

pre {{
    background-color: #f4f4f4;
    padding: 10pt;
    border-left: 3px solid #666;
    page-break-inside: avoid;
    margin: 1em 0;
    white-space: pre-wrap;
}}

pre code {{ background-color: transparent; padding: 0; color: inherit; }}

blockquote {{
    border-left: 4px solid #ddd;
    padding-left: 15pt;
    margin-left: 0;
    color: #666;
    font-style: italic;
    page-break-inside: avoid;
}}

table {{ border-collapse: collapse; width: 100%; margin: 15pt 0; page-break-inside: avoid; }}
th, td {{ border: 1px solid #ddd; padding: 8pt; text-align: left; }}
th {{ background-color: #f4f4f4; font-weight: bold; color: #000; }}
tr:nth-child(even) {{ background-color: #fafafa; }}

img {{ max-width: 100%; height: auto; display: block; margin: 1em auto; }}
a {{ color: #0066cc; text-decoration: none; }}
ul, ol {{ margin: 0.5em 0; padding-left: 2em; }}
li {{ margin: 0.25em 0; }}
hr {{ border: none; border-top: 1px solid #ccc; margin: 2em 0; }}

nav.toc {{ margin: 1em 0 2em; page-break-after: avoid; }}
nav.toc ul {{ list-style: none; padding-left: 1.2em; }}

.front-matter {{
    border: 2px solid #333;
    background-color: #f9f9f9;
    padding: 15pt;
    margin-bottom: 20pt;
    page-break-after: avoid;
}}
.front-matter h1 {{ margin-top: 0; font-size: 18pt; border-bottom: none; }}
.front-matter p {{ margin: 0.25em 0; text-align: left; }}
"#,
        title = css_string(title)
    )
}

/// Escapes text for use inside a double-quoted CSS string.
fn css_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '<' => escaped.push_str("\\3c "),
            '\n' | '\r' | '\t' => escaped.push(' '),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

/// Keeps caller CSS from closing the surrounding `<style>` element.
fn contain_style(css: &str) -> String {
    css.replace("</", "<\\/")
}

/// Full HTML document handed to the PDF engine.
pub(crate) fn html_document(
    title: Option<&str>,
    highlight_css: &str,
    stylesheet: &str,
    front_matter_panel: &str,
    body_html: &str,
) -> String {
    let title = escape_html(title.unwrap_or(DEFAULT_DOCUMENT_TITLE));
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{}\n{}\n</style>\n</head>\n<body>\n{front_matter_panel}{body_html}</body>\n</html>\n",
        contain_style(highlight_css),
        contain_style(stylesheet),
    )
}

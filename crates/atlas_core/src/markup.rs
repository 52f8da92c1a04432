//! Markdown ⇄ markup conversion for the local backing store.
//!
//! # Responsibility
//! - Render stored markdown into editable markup for `rendered_content`.
//! - Turn markup saved from the rich-text surface back into markdown.
//!
//! # Invariants
//! - Only the store calls this; the edit session forwards whichever
//!   representation the active mode produced and never converts.
//! - Conversion is lossy; the markdown produced on save is canonical.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static HEADING_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("valid heading regex"));
static BULLET_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*+]\s+(.*)$").expect("valid bullet regex"));
static STRONG_MD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid strong regex"));
static EM_MD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("valid em regex"));
static CODE_MD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid code regex"));

static HEADING_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]>").expect("valid heading tag regex")
});
static LIST_ITEM_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<li[^>]*>(.*?)</li>").expect("valid li regex"));
static LIST_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(ul|ol)[^>]*>").expect("valid list regex"));
static PARAGRAPH_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("valid p regex"));
static BREAK_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid br regex"));
static STRONG_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(strong|b)>").expect("valid strong tag regex"));
static EM_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(em|i)>").expect("valid em tag regex"));
static CODE_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?code>").expect("valid code tag regex"));
static ANY_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank run regex"));

/// Bidirectional converter between markdown and editable markup.
pub trait MarkupConverter {
    fn to_markup(&self, markdown: &str) -> String;
    fn to_markdown(&self, markup: &str) -> String;
}

/// Regex-based converter for headings, paragraphs, bullet lists, emphasis
/// and inline code.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicMarkupConverter;

impl MarkupConverter for BasicMarkupConverter {
    fn to_markup(&self, markdown: &str) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut paragraph: Vec<String> = Vec::new();
        let mut list: Vec<String> = Vec::new();

        for line in markdown.lines() {
            let line = line.trim_end();
            if line.trim().is_empty() {
                flush_paragraph(&mut paragraph, &mut blocks);
                flush_list(&mut list, &mut blocks);
                continue;
            }
            if let Some(caps) = HEADING_LINE_RE.captures(line) {
                flush_paragraph(&mut paragraph, &mut blocks);
                flush_list(&mut list, &mut blocks);
                let level = caps[1].len();
                blocks.push(format!("<h{level}>{}</h{level}>", render_inline(&caps[2])));
            } else if let Some(caps) = BULLET_LINE_RE.captures(line) {
                flush_paragraph(&mut paragraph, &mut blocks);
                list.push(format!("<li>{}</li>", render_inline(&caps[1])));
            } else {
                flush_list(&mut list, &mut blocks);
                paragraph.push(render_inline(line.trim()));
            }
        }
        flush_paragraph(&mut paragraph, &mut blocks);
        flush_list(&mut list, &mut blocks);

        blocks.join("\n")
    }

    fn to_markdown(&self, markup: &str) -> String {
        let text = HEADING_TAG_RE.replace_all(markup, |caps: &Captures<'_>| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("\n{} {}\n\n", "#".repeat(level), caps[2].trim())
        });
        let text = LIST_ITEM_TAG_RE.replace_all(&text, |caps: &Captures<'_>| {
            format!("- {}\n", caps[1].trim())
        });
        let text = LIST_TAG_RE.replace_all(&text, "\n");
        let text = PARAGRAPH_TAG_RE.replace_all(&text, |caps: &Captures<'_>| {
            format!("{}\n\n", caps[1].trim())
        });
        let text = BREAK_TAG_RE.replace_all(&text, "\n");
        let text = STRONG_TAG_RE.replace_all(&text, "**");
        let text = EM_TAG_RE.replace_all(&text, "*");
        let text = CODE_TAG_RE.replace_all(&text, "`");
        let text = ANY_TAG_RE.replace_all(&text, "");
        let text = unescape(&text);
        let text = BLANK_RUN_RE.replace_all(&text, "\n\n");

        let trimmed = text.trim();
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}\n")
        }
    }
}

fn flush_paragraph(paragraph: &mut Vec<String>, blocks: &mut Vec<String>) {
    if !paragraph.is_empty() {
        blocks.push(format!("<p>{}</p>", paragraph.join(" ")));
        paragraph.clear();
    }
}

fn flush_list(list: &mut Vec<String>, blocks: &mut Vec<String>) {
    if !list.is_empty() {
        blocks.push(format!("<ul>{}</ul>", list.join("")));
        list.clear();
    }
}

fn render_inline(text: &str) -> String {
    let escaped = escape(text);
    let with_code = CODE_MD_RE.replace_all(&escaped, "<code>$1</code>");
    let with_strong = STRONG_MD_RE.replace_all(&with_code, "<strong>$1</strong>");
    EM_MD_RE
        .replace_all(&with_strong, "<em>$1</em>")
        .into_owned()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::{BasicMarkupConverter, MarkupConverter};

    #[test]
    fn renders_headings_paragraphs_and_lists() {
        let markup = BasicMarkupConverter.to_markup("# Title\n\nsome **bold** text\n\n- one\n- two");
        assert_eq!(
            markup,
            "<h1>Title</h1>\n<p>some <strong>bold</strong> text</p>\n<ul><li>one</li><li>two</li></ul>"
        );
    }

    #[test]
    fn converts_markup_back_to_markdown() {
        let markdown = BasicMarkupConverter
            .to_markdown("<h2>Notes</h2><p>use <code>cargo</code> &amp; <em>care</em></p><ul><li>a</li></ul>");
        assert_eq!(markdown, "## Notes\n\nuse `cargo` & *care*\n\n- a\n");
    }

    #[test]
    fn empty_markup_yields_empty_markdown() {
        assert_eq!(BasicMarkupConverter.to_markdown("<p></p>"), "");
    }

    #[test]
    fn escapes_angle_brackets_in_source() {
        let markup = BasicMarkupConverter.to_markup("a <b> c");
        assert_eq!(markup, "<p>a &lt;b&gt; c</p>");
    }
}

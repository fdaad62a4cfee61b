//! Markup to reading-view text.
//!
//! The structured path walks the parsed document body, skipping subtrees that
//! never hold readable content and turning images into bracketed alt-text
//! markers. If the body cannot be located the degraded path replaces every tag
//! with a space, so some text always comes back.

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::warn;

static RE_ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const SKIPPED_TAGS: [&str; 6] = ["script", "style", "meta", "link", "svg", "head"];

const BLOCK_TAGS: [&str; 22] = [
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "header", "hr", "li", "main", "nav", "ol", "section", "table", "tr", "ul", "pre",
];

const PARAGRAPH_TAGS: [&str; 7] = ["p", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Plain text of an HTML/XHTML document or fragment. Never fails.
pub fn extract_text(raw: &str) -> String {
    extract_with(raw, structured_text)
}

/// html5ever synthesizes a `<body>` for any input, so through `extract_text`
/// the tag-stripping branch is only taken if the structured pass itself errors.
fn extract_with(raw: &str, structured: impl FnOnce(&str) -> Result<String>) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match structured(raw) {
        Ok(text) => text,
        Err(err) => {
            warn!("Structured text extraction failed, stripping tags: {err:#}");
            strip_tags(raw)
        }
    }
}

/// Degraded path: every `<...>` token becomes a single space.
pub fn strip_tags(raw: &str) -> String {
    RE_ANY_TAG.replace_all(raw, " ").into_owned()
}

fn structured_text(raw: &str) -> Result<String> {
    let document = Html::parse_document(raw);
    let body_selector =
        Selector::parse("body").map_err(|err| anyhow!("invalid body selector: {err:?}"))?;
    let body = document
        .select(&body_selector)
        .next()
        .ok_or_else(|| anyhow!("document has no body"))?;

    let mut out = TextSink::default();
    walk(body, &mut out);
    Ok(out.finish())
}

enum Step<'a> {
    Enter(ElementRef<'a>),
    Text(&'a str),
    Leave(Closing),
}

#[derive(Clone, Copy)]
enum Closing {
    Paragraph,
    Block { pre: bool },
    Cell,
}

/// Depth-first walk with an explicit stack; nesting depth never touches the
/// call stack.
fn walk(body: ElementRef<'_>, out: &mut TextSink) {
    let mut stack = Vec::new();
    let mut pre_depth = 0usize;
    push_children(body, &mut stack);

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) if pre_depth > 0 => out.push_raw(text),
            Step::Text(text) => out.push_collapsed(text),
            Step::Leave(Closing::Paragraph) => out.blank_line(),
            Step::Leave(Closing::Block { pre }) => {
                if pre {
                    pre_depth -= 1;
                }
                out.line_break();
            }
            Step::Leave(Closing::Cell) => out.push_raw("\t"),
            Step::Enter(element) => enter(element, out, &mut stack, &mut pre_depth),
        }
    }
}

fn enter<'a>(
    element: ElementRef<'a>,
    out: &mut TextSink,
    stack: &mut Vec<Step<'a>>,
    pre_depth: &mut usize,
) {
    let el = element.value();
    let name = el.name().to_ascii_lowercase();
    let name = name.as_str();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    match name {
        "img" => {
            if let Some(alt) = el.attr("alt").filter(|alt| !alt.trim().is_empty()) {
                out.push_raw(&format!(" [Image: {alt}] "));
            }
            return;
        }
        "br" => {
            out.line_break();
            return;
        }
        _ if PARAGRAPH_TAGS.contains(&name) => {
            out.blank_line();
            stack.push(Step::Leave(Closing::Paragraph));
        }
        _ if BLOCK_TAGS.contains(&name) => {
            out.line_break();
            let pre = name == "pre";
            if pre {
                *pre_depth += 1;
            }
            stack.push(Step::Leave(Closing::Block { pre }));
        }
        "td" | "th" => stack.push(Step::Leave(Closing::Cell)),
        _ => {}
    }
    push_children(element, stack);
}

/// Children go on in reverse so they pop in document order.
fn push_children<'a>(element: ElementRef<'a>, stack: &mut Vec<Step<'a>>) {
    for child in element.children().rev() {
        match child.value() {
            Node::Text(text) => stack.push(Step::Text(&**text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    stack.push(Step::Enter(child));
                }
            }
            _ => {}
        }
    }
}

/// Accumulates rendered text, tracking pending line breaks so consecutive
/// block boundaries do not stack up.
#[derive(Default)]
struct TextSink {
    text: String,
    pending_breaks: usize,
}

impl TextSink {
    fn push_collapsed(&mut self, text: &str) {
        let collapsed = RE_INLINE_WS.replace_all(text, " ");
        if collapsed.trim().is_empty() {
            // whitespace-only nodes between blocks carry no text
            if self.pending_breaks == 0 && !self.text.is_empty() && !self.text.ends_with(' ') {
                self.text.push(' ');
            }
            return;
        }
        let collapsed = if self.pending_breaks > 0 || self.text.is_empty() {
            collapsed.trim_start().to_string()
        } else {
            collapsed.into_owned()
        };
        self.push_raw(&collapsed);
    }

    fn push_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            for _ in 0..self.pending_breaks {
                self.text.push('\n');
            }
        }
        self.pending_breaks = 0;
        self.text.push_str(text);
    }

    fn line_break(&mut self) {
        self.pending_breaks = self.pending_breaks.max(1);
    }

    fn blank_line(&mut self) {
        self.pending_breaks = 2;
    }

    fn finish(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_become_bracketed_markers() {
        let text = extract_text("<html><body><p>One</p><img alt='x'></body></html>");
        assert!(text.contains("One"));
        assert!(text.contains(" [Image: x] "), "got {text:?}");
    }

    #[test]
    fn images_without_alt_are_dropped() {
        let text = extract_text("<body><p>A<img src='a.png'><img alt='  '>B</p></body>");
        assert_eq!(text, "AB");
    }

    #[test]
    fn non_content_elements_are_removed() {
        let raw = r#"<html><head><title>Hidden title</title><style>p { color: red }</style>
            <meta charset="utf-8"><link rel="stylesheet" href="x.css"></head>
            <body><script>var secret = 1;</script><p>Visible</p>
            <svg><text>vector words</text></svg></body></html>"#;
        let text = extract_text(raw);
        assert_eq!(text.trim(), "Visible");
        for leaked in ["Hidden title", "color: red", "secret", "vector words", "<script", "<style"] {
            assert!(!text.contains(leaked), "leaked {leaked:?} in {text:?}");
        }
    }

    #[test]
    fn paragraphs_and_breaks_shape_lines() {
        let raw = "<body><h1>Title</h1><p>First  line<br/>second\n line</p><div>After</div></body>";
        assert_eq!(extract_text(raw), "Title\n\nFirst line\nsecond line\n\nAfter");
    }

    #[test]
    fn xhtml_documents_parse() {
        let raw = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>t</title></head>
<body><p>Merhaba dünya</p></body></html>"#;
        assert_eq!(extract_text(raw), "Merhaba dünya");
    }

    #[test]
    fn malformed_markup_still_returns_text() {
        let text = extract_text("<p>unclosed <b>bold <i>mixed</p> tail</b");
        assert!(text.contains("unclosed"));
        assert!(text.contains("mixed"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(extract_text(""), "");
    }

    #[test]
    fn tag_stripping_fallback_replaces_tags_with_spaces() {
        assert_eq!(strip_tags("<p>a</p><br/>b"), " a  b");
    }

    #[test]
    fn failed_structured_pass_falls_back_to_stripping() {
        let text = extract_with("<p>kept</p><script>x</script>", |_| {
            Err(anyhow!("no usable tree"))
        });
        assert_eq!(text, " kept  x ");
        assert_eq!(extract_with("", |_| Err(anyhow!("unused"))), "");
    }

    #[test]
    fn deeply_nested_markup_does_not_exhaust_the_stack() {
        let depth = 120_000;
        let raw = format!(
            "<body>{}deep{}</body>",
            "<span>".repeat(depth),
            "</span>".repeat(depth)
        );
        // same stack size the main thread gets
        let text = std::thread::Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn(move || extract_text(&raw))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(text, "deep");
    }

    #[test]
    fn preformatted_text_keeps_its_whitespace() {
        let raw = "<body><pre>a   b\n  c</pre><p>x   y</p></body>";
        assert_eq!(extract_text(raw), "a   b\n  c\n\nx y");
    }

    #[test]
    fn table_cells_are_tab_separated() {
        let raw = "<body><table><tr><td>a</td><td>b</td></tr></table></body>";
        assert_eq!(extract_text(raw), "a\tb\t");
    }
}

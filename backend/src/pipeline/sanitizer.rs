//! Strips embedded media out of a feed item's HTML body.
//!
//! The body is parsed with html5ever (through `scraper`), so unbalanced or sloppy
//! markup is repaired the way a browser would repair it. Every `<img>`, `<iframe>`
//! and `<blockquote>` is replaced by a placeholder token, and what it referenced is
//! collected in document order. Everything else is serialized back unchanged.
//!
//! A blockquote is captured whole. Images and iframes inside it are neither counted
//! nor tokenized: they travel with the captured markup and come back when the
//! `[BLOCKQUOTE]` placeholder is substituted.

use scraper::{ElementRef, Html, Node};
use serde::Serialize;

pub const IMAGE_TOKEN: &str = "[IMAGE]";
pub const IFRAME_TOKEN: &str = "[IFRAME]";
pub const BLOCKQUOTE_TOKEN: &str = "[BLOCKQUOTE]";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Sanitized text plus the media pulled out of it, all in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizedContent {
    pub text: String,
    pub images: Vec<String>,
    pub iframes: Vec<String>,
    pub blockquotes: Vec<String>,
    pub thumbnail: Option<String>,
}

enum Piece {
    Markup(String),
    Image,
}

struct Walker<'a> {
    thumbnail: Option<&'a str>,
    pieces: Vec<Piece>,
    images: Vec<String>,
    iframes: Vec<String>,
    blockquotes: Vec<String>,
}

impl Walker<'_> {
    fn markup(&mut self, s: &str) {
        match self.pieces.last_mut() {
            Some(Piece::Markup(buf)) => buf.push_str(s),
            _ => self.pieces.push(Piece::Markup(s.to_string())),
        }
    }

    fn walk_children(&mut self, parent: ElementRef<'_>) {
        let raw_text = RAW_TEXT_ELEMENTS.contains(&parent.value().name());
        let mut swallow_until = None;
        for child in parent.children() {
            if let Some(script_id) = swallow_until {
                if child.id() == script_id {
                    swallow_until = None;
                }
                continue;
            }
            match child.value() {
                Node::Text(text) => {
                    if raw_text {
                        self.markup(text);
                    } else {
                        let escaped = escape_text(text);
                        self.markup(&escaped);
                    }
                }
                Node::Comment(comment) => {
                    let rendered = format!("<!--{}-->", &**comment);
                    self.markup(&rendered);
                }
                Node::Element(_) => {
                    if let Some(element) = ElementRef::wrap(child) {
                        if element.value().name() == "blockquote" {
                            let mut captured = element.html();
                            // A twitter/instagram style embed: the blockquote is followed by
                            // an empty loader script that belongs with it.
                            if let Some((script, between)) = trailing_empty_script(element) {
                                captured.push_str(&between);
                                captured.push_str(&script.html());
                                swallow_until = Some(script.id());
                            }
                            self.blockquotes.push(captured);
                            self.markup(BLOCKQUOTE_TOKEN);
                        } else {
                            self.walk_element(element);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        match name {
            "img" => {
                let src = element.value().attr("src").unwrap_or_default().trim();
                if !src.is_empty() && Some(src) != self.thumbnail {
                    self.images.push(src.to_string());
                }
                self.pieces.push(Piece::Image);
            }
            "iframe" => {
                let src = element.value().attr("src").unwrap_or_default().trim();
                if !src.is_empty() {
                    self.iframes.push(src.to_string());
                }
                self.markup(IFRAME_TOKEN);
            }
            _ => {
                let mut open = format!("<{name}");
                for (attr, value) in element.value().attrs() {
                    open.push(' ');
                    open.push_str(attr);
                    open.push_str("=\"");
                    open.push_str(&escape_attr(value));
                    open.push('"');
                }
                open.push('>');
                self.markup(&open);
                if !VOID_ELEMENTS.contains(&name) {
                    self.walk_children(element);
                    let close = format!("</{name}>");
                    self.markup(&close);
                }
            }
        }
    }
}

/// If the next sibling, skipping whitespace-only text, is an empty `<script>`,
/// returns it together with the whitespace in between.
fn trailing_empty_script(element: ElementRef<'_>) -> Option<(ElementRef<'_>, String)> {
    let mut between = String::new();
    for sibling in element.next_siblings() {
        match sibling.value() {
            Node::Text(text) if text.trim().is_empty() => between.push_str(text),
            Node::Element(next) if next.name() == "script" => {
                let script = ElementRef::wrap(sibling)?;
                let body: String = script.text().collect();
                return body.trim().is_empty().then_some((script, between));
            }
            _ => return None,
        }
    }
    None
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Replaces media with placeholder tokens and collects what was removed.
///
/// Images whose `src` equals the thumbnail still get an `[IMAGE]` token but are not
/// collected. When no other image exists and a thumbnail is known, the thumbnail
/// becomes the only image and the first `[IMAGE]` token is dropped.
pub fn sanitize(html: &str, thumbnail: Option<&str>) -> SanitizedContent {
    let thumbnail = thumbnail.map(str::trim).filter(|t| !t.is_empty());
    let fragment = Html::parse_fragment(html);

    let mut walker = Walker {
        thumbnail,
        pieces: Vec::new(),
        images: Vec::new(),
        iframes: Vec::new(),
        blockquotes: Vec::new(),
    };
    walker.walk_children(fragment.root_element());

    let Walker {
        mut pieces,
        mut images,
        iframes,
        blockquotes,
        ..
    } = walker;

    if images.is_empty() {
        if let Some(thumb) = thumbnail {
            images.push(thumb.to_string());
            if let Some(first) = pieces.iter().position(|p| matches!(p, Piece::Image)) {
                pieces.remove(first);
            }
        }
    }

    let text = pieces
        .into_iter()
        .map(|piece| match piece {
            Piece::Markup(s) => s,
            Piece::Image => IMAGE_TOKEN.to_string(),
        })
        .collect();

    SanitizedContent {
        text,
        images,
        iframes,
        blockquotes,
        thumbnail: thumbnail.map(str::to_string),
    }
}

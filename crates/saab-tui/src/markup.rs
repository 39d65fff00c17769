//! Turning server reply text into terminal lines.
//!
//! Replies may carry light HTML (`<br>`, `<p>`, `<b>`, lists) and `**bold**`
//! markdown. Tags are reduced to line breaks and bold markers, everything else
//! is stripped.

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use scraper::{ElementRef, Html, Node};
use unicode_width::UnicodeWidthChar;

const BOLD_MARKER: &str = "**";
const BULLET: &str = "\u{2022} ";

/// Reduce HTML-ish reply text to plain text with `**` bold markers.
pub fn to_display_text(raw: &str) -> String {
    if !raw.contains(['<', '&']) {
        return raw.to_string();
    }

    let fragment = Html::parse_fragment(raw);
    let mut out = String::with_capacity(raw.len());
    push_children(fragment.root_element(), &mut out);
    out
}

fn push_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn push_element(element: ElementRef<'_>, out: &mut String) {
    match element.value().name() {
        "br" => out.push('\n'),
        "script" | "style" => {}
        "b" | "strong" => {
            out.push_str(BOLD_MARKER);
            push_children(element, out);
            out.push_str(BOLD_MARKER);
        }
        "li" => {
            out.push_str(BULLET);
            push_children(element, out);
            out.push('\n');
        }
        "p" | "div" | "ul" | "ol" => {
            push_children(element, out);
            out.push('\n');
        }
        _ => push_children(element, out),
    }
}

/// Style `**bold**` runs in one line. An unclosed marker stays literal.
pub fn parse_markdown_line(text: &str) -> Line<'static> {
    let parts: Vec<&str> = text.split(BOLD_MARKER).collect();
    let balanced = parts.len() % 2 == 1;
    let last = parts.len() - 1;

    let mut spans: Vec<Span<'static>> = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let bold = i % 2 == 1;
        if bold && i == last && !balanced {
            spans.push(Span::raw(format!("{BOLD_MARKER}{part}")));
        } else if part.is_empty() {
            continue;
        } else if bold {
            spans.push(Span::styled(
                part.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::raw(part.to_string()));
        }
    }

    Line::from(spans)
}

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

/// Cut one word into pieces no wider than `width` columns.
fn split_word(word: &str, width: usize) -> Vec<(String, usize)> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_width = 0;

    for c in word.chars() {
        let w = char_width(c);
        if piece_width > 0 && piece_width + w > width {
            pieces.push((std::mem::take(&mut piece), piece_width));
            piece_width = 0;
        }
        piece.push(c);
        piece_width += w;
    }
    if !piece.is_empty() {
        pieces.push((piece, piece_width));
    }
    pieces
}

/// Wrap text to fit within a given width, returning multiple lines.
/// Widths are terminal columns, so wide (CJK, emoji) characters count double.
/// Breaks on word boundaries; words wider than the line are split.
pub fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        for (piece, piece_width) in split_word(word, width) {
            if current_width > 0 && current_width + 1 + piece_width <= width {
                current_line.push(' ');
                current_line.push_str(&piece);
                current_width += 1 + piece_width;
            } else {
                if current_width > 0 {
                    lines.push(std::mem::take(&mut current_line));
                }
                current_line = piece;
                current_width = piece_width;
            }
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

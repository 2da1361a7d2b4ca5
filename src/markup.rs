//! Position-aware markup scanner.
//!
//! This is deliberately tolerant: templates are authored fragments, not documents, so
//! unclosed elements close at end of input and stray close tags are dropped. Every node
//! keeps byte offsets into the authored text.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::expr_parser::find_balanced_brace_end;
use crate::span::SourceSpan;

lazy_static! {
    static ref VOID_ELEMENTS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for tag in [
            "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
            "source", "track", "wbr",
        ] {
            s.insert(tag);
        }
        s
    };
    static ref RAW_TEXT_ELEMENTS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("script");
        s.insert("style");
        s
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttr {
    pub name: String,
    pub name_span: SourceSpan,
    pub value: Option<String>,
    /// Span of the value text, excluding quotes.
    pub value_span: Option<SourceSpan>,
}

impl RawAttr {
    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Offset where the value text starts; for bare attributes, the end of the name.
    pub fn value_start(&self) -> u32 {
        self.value_span.map(|s| s.start).unwrap_or(self.name_span.end)
    }

    pub fn span(&self) -> SourceSpan {
        let end = self.value_span.map(|s| s.end).unwrap_or(self.name_span.end);
        SourceSpan::new(self.name_span.start, end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub tag: String,
    pub attrs: Vec<RawAttr>,
    pub children: Vec<RawNode>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawNode {
    Element(RawElement),
    Text { text: String, span: SourceSpan },
    Comment { text: String, span: SourceSpan },
}

impl RawNode {
    pub fn span(&self) -> SourceSpan {
        match self {
            RawNode::Element(el) => el.span,
            RawNode::Text { span, .. } | RawNode::Comment { span, .. } => *span,
        }
    }

    /// Whitespace text and comments do not count as content.
    pub fn is_significant(&self) -> bool {
        match self {
            RawNode::Element(_) => true,
            RawNode::Text { text, .. } => !text.trim().is_empty(),
            RawNode::Comment { .. } => false,
        }
    }
}

pub fn scan(source: &str) -> Vec<RawNode> {
    let mut scanner = Scanner {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        stack: Vec::new(),
        roots: Vec::new(),
    };
    scanner.run();
    scanner.roots
}

struct Scanner<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
    stack: Vec<RawElement>,
    roots: Vec<RawNode>,
}

impl<'s> Scanner<'s> {
    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            if self.starts_with("<!--") {
                self.comment();
            } else if self.starts_with("<!") {
                // doctype and other declarations
                self.pos = self.find_from(self.pos, ">").map(|p| p + 1).unwrap_or(self.bytes.len());
            } else if self.starts_with("</") && self.peek_is_alpha(2) {
                self.close_tag();
            } else if self.bytes[self.pos] == b'<' && self.peek_is_alpha(1) {
                self.open_tag();
            } else {
                self.text();
            }
        }

        let end = self.bytes.len() as u32;
        while let Some(mut el) = self.stack.pop() {
            el.span.end = end;
            self.push(RawNode::Element(el));
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn peek_is_alpha(&self, ahead: usize) -> bool {
        self.bytes
            .get(self.pos + ahead)
            .map(|b| b.is_ascii_alphabetic())
            .unwrap_or(false)
    }

    fn find_from(&self, from: usize, needle: &str) -> Option<usize> {
        self.src.get(from..)?.find(needle).map(|i| from + i)
    }

    fn push(&mut self, node: RawNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn comment(&mut self) {
        let start = self.pos;
        let body_start = start + 4;
        let (body_end, end) = match self.find_from(body_start, "-->") {
            Some(p) => (p, p + 3),
            None => (self.bytes.len(), self.bytes.len()),
        };
        self.pos = end;
        self.push(RawNode::Comment {
            text: self.src[body_start..body_end].to_string(),
            span: SourceSpan::new(start as u32, end as u32),
        });
    }

    fn text(&mut self) {
        let start = self.pos;
        let mut i = self.pos;
        while i < self.bytes.len() {
            let b = self.bytes[i];
            if b == b'$' && self.bytes.get(i + 1) == Some(&b'{') {
                if let Some(end) = find_balanced_brace_end(self.src, i + 1) {
                    i = end;
                    continue;
                }
            }
            if b == b'<' {
                let next = self.bytes.get(i + 1).copied().unwrap_or(b' ');
                if next.is_ascii_alphabetic() || next == b'/' || next == b'!' {
                    break;
                }
            }
            i += 1;
        }
        // A lone "</" that is not a close tag would otherwise stall the scanner.
        if i == start {
            i += 1;
        }
        self.pos = i;
        self.push(RawNode::Text {
            text: self.src[start..i].to_string(),
            span: SourceSpan::new(start as u32, i as u32),
        });
    }

    fn read_name(&mut self) -> (String, usize, usize) {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_whitespace() || b == b'>' || b == b'/' || b == b'=' {
                break;
            }
            self.pos += 1;
        }
        (self.src[start..self.pos].to_string(), start, self.pos)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn open_tag(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let (name, _, _) = self.read_name();
        let tag = name.to_ascii_lowercase();
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            if self.pos >= self.bytes.len() {
                break;
            }
            match self.bytes[self.pos] {
                b'>' => {
                    self.pos += 1;
                    break;
                }
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    self_closing = true;
                    break;
                }
                b'/' | b'=' => {
                    self.pos += 1;
                }
                _ => attrs.push(self.attribute()),
            }
        }

        let el = RawElement {
            tag: tag.clone(),
            attrs,
            children: Vec::new(),
            span: SourceSpan::new(start as u32, self.pos as u32),
        };

        if self_closing || VOID_ELEMENTS.contains(tag.as_str()) {
            self.push(RawNode::Element(el));
        } else if RAW_TEXT_ELEMENTS.contains(tag.as_str()) {
            self.raw_text(el);
        } else {
            self.stack.push(el);
        }
    }

    fn attribute(&mut self) -> RawAttr {
        let (name, name_start, name_end) = self.read_name();
        let name_span = SourceSpan::new(name_start as u32, name_end as u32);
        let checkpoint = self.pos;
        self.skip_whitespace();

        if self.bytes.get(self.pos) != Some(&b'=') {
            self.pos = checkpoint;
            return RawAttr {
                name,
                name_span,
                value: None,
                value_span: None,
            };
        }
        self.pos += 1;
        self.skip_whitespace();

        let (value_start, value_end) = match self.bytes.get(self.pos) {
            Some(&q) if q == b'"' || q == b'\'' => {
                let value_start = self.pos + 1;
                let value_end = self.bytes[value_start..]
                    .iter()
                    .position(|&b| b == q)
                    .map(|p| value_start + p)
                    .unwrap_or(self.bytes.len());
                self.pos = (value_end + 1).min(self.bytes.len());
                (value_start, value_end)
            }
            _ => {
                let value_start = self.pos;
                while self.pos < self.bytes.len()
                    && !self.bytes[self.pos].is_ascii_whitespace()
                    && self.bytes[self.pos] != b'>'
                {
                    self.pos += 1;
                }
                (value_start, self.pos)
            }
        };

        RawAttr {
            name,
            name_span,
            value: Some(self.src[value_start..value_end].to_string()),
            value_span: Some(SourceSpan::new(value_start as u32, value_end as u32)),
        }
    }

    fn raw_text(&mut self, mut el: RawElement) {
        let body_start = self.pos;
        let lower = self.src[body_start..].to_ascii_lowercase();
        let close = format!("</{}", el.tag);
        let body_end = lower
            .find(&close)
            .map(|p| body_start + p)
            .unwrap_or(self.bytes.len());
        if body_end > body_start {
            el.children.push(RawNode::Text {
                text: self.src[body_start..body_end].to_string(),
                span: SourceSpan::new(body_start as u32, body_end as u32),
            });
        }
        self.pos = self
            .find_from(body_end, ">")
            .map(|p| p + 1)
            .unwrap_or(self.bytes.len());
        el.span.end = self.pos as u32;
        self.push(RawNode::Element(el));
    }

    fn close_tag(&mut self) {
        let tag_start = self.pos;
        self.pos += 2;
        let (name, _, _) = self.read_name();
        let tag = name.to_ascii_lowercase();
        self.pos = self
            .find_from(self.pos, ">")
            .map(|p| p + 1)
            .unwrap_or(self.bytes.len());

        let Some(depth) = self.stack.iter().rposition(|el| el.tag == tag) else {
            return;
        };
        // Implicitly close anything opened inside the matched element.
        while self.stack.len() > depth + 1 {
            if let Some(mut inner) = self.stack.pop() {
                inner.span.end = tag_start as u32;
                self.push(RawNode::Element(inner));
            }
        }
        if let Some(mut el) = self.stack.pop() {
            el.span.end = self.pos as u32;
            self.push(RawNode::Element(el));
        }
    }
}

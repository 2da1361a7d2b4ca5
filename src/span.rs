//! Byte-offset spans over authored markup and synthesized overlay text.

use serde::{Deserialize, Serialize};

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: u32,
    pub end: u32,
}

impl SourceSpan {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// `start <= offset < end`
    pub fn contains_offset(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    /// `start <= offset <= end`
    pub fn contains_offset_inclusive(&self, offset: u32) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub fn contains_span(&self, other: SourceSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn shifted(&self, delta: u32) -> Self {
        Self::new(self.start + delta, self.end + delta)
    }

    pub fn slice<'s>(&self, text: &'s str) -> &'s str {
        text.get(self.start as usize..self.end as usize).unwrap_or("")
    }
}

impl From<oxc_span::Span> for SourceSpan {
    fn from(span: oxc_span::Span) -> Self {
        Self::new(span.start, span.end)
    }
}

impl std::fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// 1-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Offsets of every line start, for turning byte offsets into line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    pub fn location(&self, offset: u32) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        SourceLocation {
            line: line as u32 + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_and_inclusive_containment() {
        let span = SourceSpan::new(4, 8);
        assert!(span.contains_offset(4));
        assert!(!span.contains_offset(8));
        assert!(span.contains_offset_inclusive(8));
        assert!(!span.contains_offset_inclusive(9));
        assert!(span.contains_span(SourceSpan::new(5, 8)));
        assert!(!span.contains_span(SourceSpan::new(3, 6)));
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.location(0), SourceLocation { line: 1, column: 1 });
        assert_eq!(index.location(3), SourceLocation { line: 2, column: 1 });
        assert_eq!(index.location(4), SourceLocation { line: 2, column: 2 });
        assert_eq!(index.location(7), SourceLocation { line: 4, column: 1 });
    }
}

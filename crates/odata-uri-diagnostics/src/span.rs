//! Source spans for query option and path text
//!
//! OData query options are single-line strings, so a location is just an offset
//! into the text the parser was handed. Nested texts (an `$expand` term's inner
//! `$filter`, a key predicate inside a path segment) are parsed on their own and
//! their spans shifted back into the coordinates of the enclosing text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// A span in the source text, represented as a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span from start and end offsets
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create a zero-width span at a position
    #[inline]
    pub const fn point(pos: usize) -> Self {
        Self { start: pos, end: pos }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Merge two spans into one that covers both
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Move the span right by `base` bytes.
    ///
    /// Used when a sub-text starting at `base` was parsed independently.
    #[inline]
    pub const fn shift(self, base: usize) -> Self {
        Self {
            start: self.start + base,
            end: self.end + base,
        }
    }

    #[inline]
    pub const fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Character (not byte) offset of the span start within `source`
    pub fn char_offset(&self, source: &str) -> usize {
        let clamped = self.start.min(source.len());
        source
            .char_indices()
            .take_while(|(i, _)| *i < clamped)
            .count()
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A node with an associated span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spanned<T> {
    /// The inner value
    pub inner: T,
    /// The source span
    pub span: Span,
}

impl<T> Spanned<T> {
    pub const fn new(inner: T, span: Span) -> Self {
        Self { inner, span }
    }

    /// Map the inner value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            inner: f(self.inner),
            span: self.span,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

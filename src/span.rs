//! Source positions attached to AST nodes and reports.

use std::ops::{Deref, DerefMut};

/// A value of `T` paired with the [`Span`] it was produced from.
///
/// Methods on `&T` can be called transparently on `&Spanned<T>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spanned<T> {
    pub item: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            item: f(self.item),
            span: self.span,
        }
    }

    pub fn as_ref(&self) -> Spanned<&T> {
        Spanned {
            item: &self.item,
            span: self.span,
        }
    }
}

impl<T> Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.item
    }
}

impl<T> DerefMut for Spanned<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.item
    }
}

/// A half-open byte range `start..end` in a source file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: SpanIndex,
    pub end: SpanIndex,
}

/// The integer type used for span indices.
pub type SpanIndex = u32;

impl Span {
    pub const fn new(start: SpanIndex, end: SpanIndex) -> Self {
        Self { start, end }
    }

    /// Attaches `self` to `item`.
    pub fn with<T>(self, item: T) -> Spanned<T> {
        Spanned { item, span: self }
    }

    /// Returns the smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns the length in bytes (not characters) of `self`.
    pub fn length(&self) -> SpanIndex {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::Span;

    #[test]
    fn join_covers_both_spans() {
        let a = Span::new(4, 9);
        let b = Span::new(2, 6);
        let joined = a.join(b);

        assert_eq!(joined, Span::new(2, 9));
        assert!(joined.contains(a));
        assert!(joined.contains(b));
        assert_eq!(joined.length(), 7);
    }

    #[test]
    fn spanned_derefs_to_item() {
        let spanned = Span::new(0, 3).with(String::from("val"));
        assert_eq!(spanned.len(), 3);
        assert_eq!(spanned.map(|s| s.len()).item, 3);
    }
}

//! Common error functionality.
//!
//! All of the error types of this crate implement the [`Error`] trait here,
//! which exposes:
//! - a stable, kebab-case error [`code`](Error::code) (the identifier the
//!   compile facade reports),
//! - an optional source [`span`](Error::span), and
//! - an optional [`help`](Error::help) message.
//!
//! The [`SourceInfo`] struct maps byte offsets in source code back to line
//! and column numbers for error reporting.

use std::borrow::Cow;
use std::ops::Range;

/// Common trait for all error types of this crate.
pub trait Error: std::error::Error {
    /// The stable identifier for this kind of error.
    fn code(&self) -> &'static str;

    /// The segment(s) of source code this error occurs in (if known).
    fn span(&self) -> Option<ErrSpan> {
        None
    }

    /// A short message describing how to fix the error (if one is available).
    fn help(&self) -> Option<Cow<'_, str>> {
        None
    }
}

/// The source range(s) tied to an error.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrSpan {
    /// One contiguous span.
    One(Range<usize>),
    /// Two spans (e.g., two conflicting labels).
    Two([Range<usize>; 2]),
    /// Any number of spans.
    Many(Vec<Range<usize>>),
}
impl ErrSpan {
    /// The first (or only) span.
    pub fn first(&self) -> Range<usize> {
        match self {
            ErrSpan::One(r) => r.clone(),
            ErrSpan::Two([r, _]) => r.clone(),
            ErrSpan::Many(rs) => rs.first().cloned().unwrap_or(0..0),
        }
    }

    /// Iterates over all spans.
    pub fn iter(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let slice: &[Range<usize>] = match self {
            ErrSpan::One(r) => std::slice::from_ref(r),
            ErrSpan::Two(rs) => rs,
            ErrSpan::Many(rs) => rs,
        };
        slice.iter().cloned()
    }
}
impl From<Range<usize>> for ErrSpan {
    fn from(value: Range<usize>) -> Self {
        ErrSpan::One(value)
    }
}
impl From<[Range<usize>; 2]> for ErrSpan {
    fn from(value: [Range<usize>; 2]) -> Self {
        ErrSpan::Two(value)
    }
}
impl From<Vec<Range<usize>>> for ErrSpan {
    fn from(value: Vec<Range<usize>>) -> Self {
        ErrSpan::Many(value)
    }
}

/// Position lookup over a source string.
///
/// Line and column numbers are zero-indexed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SourceInfo {
    /// The index of each newline in the source.
    nl_indices: Vec<usize>,
    len: usize,
}
impl SourceInfo {
    /// Computes the source info from a given string.
    pub fn new(src: &str) -> Self {
        let nl_indices: Vec<_> = src.match_indices('\n').map(|(i, _)| i).collect();
        Self { nl_indices, len: src.len() }
    }

    /// Counts the number of lines in the source string.
    pub fn count_lines(&self) -> usize {
        self.nl_indices.len() + 1
    }

    /// Gets the line number holding the given byte offset.
    pub fn get_line(&self, index: usize) -> usize {
        self.nl_indices.partition_point(|&nl| nl < index)
    }

    /// Calculates the `(line, column)` pair for a given byte offset.
    ///
    /// Offsets past the end of the source resolve to the end of the last
    /// line.
    pub fn get_pos_pair(&self, index: usize) -> (usize, usize) {
        let index = index.min(self.len);
        let line = self.get_line(index);
        let line_start = match line {
            0 => 0,
            _ => self.nl_indices[line - 1] + 1,
        };
        (line, index - line_start)
    }
}

#[cfg(test)]
mod tests {
    use super::SourceInfo;

    #[test]
    fn test_pos_pairs() {
        let src = "MOV AX, 1\nHLT\n\nEND";
        let info = SourceInfo::new(src);
        assert_eq!(info.count_lines(), 4);
        assert_eq!(info.get_pos_pair(0), (0, 0));
        assert_eq!(info.get_pos_pair(4), (0, 4));
        assert_eq!(info.get_pos_pair(10), (1, 0));
        assert_eq!(info.get_pos_pair(12), (1, 2));
        assert_eq!(info.get_pos_pair(15), (3, 0));
        assert_eq!(info.get_pos_pair(999), (3, 3));
    }

    #[test]
    fn test_single_line() {
        let info = SourceInfo::new("HLT");
        assert_eq!(info.count_lines(), 1);
        assert_eq!(info.get_pos_pair(2), (0, 2));
    }
}

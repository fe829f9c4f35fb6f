//! Source location tracking for error reporting.
//!
//! A [`SourceLocation`] records where a node came from: an interned file
//! path plus a 1-based line/column range. Locations survive every pass
//! unchanged (cloning preserves them bit-for-bit) so that errors raised by
//! late passes still point at the original source text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Source location of a node: file reference plus 1-based position range.
///
/// The file path is a shared interned string so that the thousands of nodes
/// produced from one file all point at the same allocation. A value of 0 for
/// any position means "unknown" (programmatically built nodes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Interned path of the originating file, if known
    pub file: Option<Arc<str>>,
    /// First line of the node (1-based, 0 = unknown)
    pub start_line: u32,
    /// First column of the node (1-based, 0 = unknown)
    pub start_column: u32,
    /// Last line of the node (inclusive)
    pub end_line: u32,
    /// Last column of the node (inclusive)
    pub end_column: u32,
}

impl SourceLocation {
    /// Create a location from a line/column range, without a file.
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            file: None,
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Attach an interned file path.
    pub fn with_file(mut self, file: Arc<str>) -> Self {
        self.file = Some(file);
        self
    }

    /// An unknown location (all positions zero, no file).
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Whether this location points at real source text.
    pub fn is_known(&self) -> bool {
        self.start_line != 0
    }

    /// Span covering both locations, from `first`'s start to `second`'s end.
    ///
    /// The file reference is taken from `first`.
    pub fn merge(first: &SourceLocation, second: &SourceLocation) -> SourceLocation {
        SourceLocation {
            file: first.file.clone(),
            start_line: first.start_line,
            start_column: first.start_column,
            end_line: second.end_line,
            end_column: second.end_column,
        }
    }
}

impl fmt::Display for SourceLocation {
    /// Renders the classic diagnostic location form.
    ///
    /// `(L,C1 -> C2)` for a single-line span, `(L, C)` for a single point
    /// and `(L1 -> L2,C1 -> C2)` when the span crosses lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            if self.start_column == self.end_column {
                write!(f, "({}, {})", self.start_line, self.start_column)
            } else {
                write!(
                    f,
                    "({},{} -> {})",
                    self.start_line, self.start_column, self.end_column
                )
            }
        } else {
            write!(
                f,
                "({} -> {},{} -> {})",
                self.start_line, self.end_line, self.start_column, self.end_column
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_location() {
        let loc = SourceLocation::unknown();
        assert!(!loc.is_known());
        assert!(loc.file.is_none());
    }

    #[test]
    fn test_merge_spans_range() {
        let first = SourceLocation::new(2, 4, 2, 9);
        let second = SourceLocation::new(3, 1, 3, 12);
        let merged = SourceLocation::merge(&first, &second);

        assert_eq!(merged.start_line, 2);
        assert_eq!(merged.start_column, 4);
        assert_eq!(merged.end_line, 3);
        assert_eq!(merged.end_column, 12);
    }

    #[test]
    fn test_display_single_line() {
        assert_eq!(SourceLocation::new(5, 11, 5, 30).to_string(), "(5,11 -> 30)");
    }

    #[test]
    fn test_display_point() {
        assert_eq!(SourceLocation::new(5, 11, 5, 11).to_string(), "(5, 11)");
    }

    #[test]
    fn test_display_multi_line() {
        assert_eq!(
            SourceLocation::new(5, 1, 9, 1).to_string(),
            "(5 -> 9,1 -> 1)"
        );
    }
}

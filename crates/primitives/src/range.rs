use std::cmp::{max, min};
use std::fmt;

/// A position in a document as zero-based line and character column.
///
/// Positions order by line, then column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
	/// Zero-based line index.
	pub line: u32,
	/// Zero-based character offset in the line.
	pub column: u32,
}

impl Position {
	/// Creates a new position.
	pub const fn new(line: u32, column: u32) -> Self {
		Self { line, column }
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// A half-open interval `[start, end)` over document positions.
///
/// Ranges order by start position, then by end position. Construction
/// normalizes the endpoints so that `start <= end` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
	/// Start position (inclusive).
	pub start: Position,
	/// End position (exclusive).
	pub end: Position,
}

impl Range {
	/// Creates a range from line/column pairs.
	pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
		Self::from_positions(Position::new(start_line, start_column), Position::new(end_line, end_column))
	}

	/// Creates a range spanning two positions, in either order.
	pub fn from_positions(a: Position, b: Position) -> Self {
		Self {
			start: min(a, b),
			end: max(a, b),
		}
	}

	/// Creates a zero-width range at a position.
	pub const fn point(pos: Position) -> Self {
		Self { start: pos, end: pos }
	}

	/// Returns true if start equals end.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	/// Returns true if `pos` lies in `[start, end)`.
	#[inline]
	pub fn contains(&self, pos: Position) -> bool {
		self.start <= pos && pos < self.end
	}

	/// Returns true if the two ranges share at least one position.
	///
	/// A zero-width range intersects a range that contains its position, or
	/// another zero-width range at the same position.
	pub fn intersects(&self, other: &Range) -> bool {
		match (self.is_empty(), other.is_empty()) {
			(true, true) => self.start == other.start,
			(true, false) => other.contains(self.start),
			(false, true) => self.contains(other.start),
			(false, false) => self.start < other.end && other.start < self.end,
		}
	}

	/// Returns true if the ranges overlap or one ends exactly where the other starts.
	pub fn intersects_or_touches(&self, other: &Range) -> bool {
		!(self.end < other.start || other.end < self.start)
	}

	/// Returns the smallest range covering both ranges.
	pub fn plus(&self, other: &Range) -> Self {
		Self {
			start: min(self.start, other.start),
			end: max(self.end, other.end),
		}
	}

	/// Returns this range with `above` lines added before and `below` lines
	/// added after, keeping the columns. The result may exceed the document
	/// and is expected to be validated by the caller.
	pub fn extend_lines(&self, above: u32, below: u32) -> Self {
		Self {
			start: Position::new(self.start.line.saturating_sub(above), self.start.column),
			end: Position::new(self.end.line.saturating_add(below), self.end.column),
		}
	}
}

impl fmt::Display for Range {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}, {})", self.start, self.end)
	}
}

use std::fmt;
use std::sync::Arc;

use ropey::Rope;

use crate::range::{Position, Range};
use crate::rope::{line_count, line_len};

/// Stable, URI-like identity of a document.
///
/// Two handles with the same key refer to the same document regardless of
/// its version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey(Arc<str>);

impl DocumentKey {
	/// Creates a key from a URI-like string.
	pub fn new(uri: impl Into<Arc<str>>) -> Self {
		Self(uri.into())
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DocumentKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for DocumentKey {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

/// Immutable view of a document at one version.
///
/// Cloning is cheap (the rope is shared), so snapshots are what async
/// providers receive instead of a reference to the live model.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
	key: DocumentKey,
	version: u64,
	language: Arc<str>,
	text: Rope,
}

impl DocumentSnapshot {
	/// Creates a snapshot.
	pub fn new(key: DocumentKey, version: u64, language: impl Into<Arc<str>>, text: Rope) -> Self {
		Self {
			key,
			version,
			language: language.into(),
			text,
		}
	}

	/// Returns the document identity.
	pub fn key(&self) -> &DocumentKey {
		&self.key
	}

	/// Returns the version this snapshot was taken at.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Returns the language identifier.
	pub fn language(&self) -> &str {
		&self.language
	}

	/// Returns the document text.
	pub fn text(&self) -> &Rope {
		&self.text
	}

	/// Returns the number of lines.
	pub fn line_count(&self) -> u32 {
		line_count(self.text.slice(..))
	}

	/// Returns the character length of `line`, excluding the terminator.
	pub fn line_len(&self, line: u32) -> u32 {
		line_len(self.text.slice(..), line)
	}

	/// Clamps a position into the document.
	pub fn validate_position(&self, pos: Position) -> Position {
		let last = self.line_count().saturating_sub(1);
		let line = pos.line.min(last);
		Position::new(line, pos.column.min(self.line_len(line)))
	}

	/// Clamps both endpoints of a range into the document.
	pub fn validate_range(&self, range: Range) -> Range {
		Range::from_positions(self.validate_position(range.start), self.validate_position(range.end))
	}

	/// Returns the range covering the whole document.
	pub fn full_range(&self) -> Range {
		let last = self.line_count().saturating_sub(1);
		Range::new(0, 0, last, self.line_len(last))
	}
}

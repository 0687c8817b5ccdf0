//! Host capabilities the engine consumes.
//!
//! The engine never owns document text or the view. It reads identity,
//! version and geometry through [`TextModel`], reads the viewport through
//! [`EditorSurface`], and writes only the decorations tagged with its own
//! [`OwnerId`].

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use vista_primitives::{DocumentKey, DocumentSnapshot, Position, Range};

use crate::semantic::SemanticSpan;

/// Tag scoping decorations to the component that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u32);

impl OwnerId {
	/// Allocates a process-unique owner tag.
	pub fn next() -> Self {
		static POOL: AtomicU32 = AtomicU32::new(0);
		Self(POOL.fetch_add(1, Ordering::Relaxed) + 1)
	}
}

/// Host-assigned decoration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecorationId(pub u64);

impl fmt::Display for DecorationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "d{}", self.0)
	}
}

/// Which side of its range injected content renders on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
	/// Rendered before the range start.
	Before,
	/// Rendered after the range end.
	After,
}

/// Interactive data attached to one rendered label segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentLink {
	/// Activation target.
	pub target: String,
	/// Index of the segment within its annotation's label.
	pub index: usize,
}

/// A renderable decoration injecting text next to a document range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
	/// Range the decoration is attached to (a word, or a zero-width marker).
	pub range: Range,
	/// Side the content renders on.
	pub placement: Placement,
	/// Injected text, with spaces replaced by no-break spaces.
	pub content: String,
	/// Style rule name acquired from the style pool.
	pub class_name: String,
	/// Present when this segment is a link.
	pub link: Option<SegmentLink>,
	/// Keep rendering when the range collapses to zero width.
	pub show_if_collapsed: bool,
}

/// A word and its column span on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSpan {
	/// The word text.
	pub word: String,
	/// First column of the word.
	pub start_column: u32,
	/// Column just past the word.
	pub end_column: u32,
}

/// Editor font metrics used to derive annotation styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorFont {
	/// Font size in pixels.
	pub size: u32,
	/// Font family list.
	pub family: String,
}

impl Default for EditorFont {
	fn default() -> Self {
		Self {
			size: 14,
			family: "monospace".into(),
		}
	}
}

/// Document model capabilities.
pub trait TextModel {
	/// Stable document identity.
	fn key(&self) -> &DocumentKey;

	/// Version counter, bumped on every content mutation.
	fn version(&self) -> u64;

	/// Language identifier.
	fn language(&self) -> &str;

	/// Immutable snapshot handed to async providers.
	fn snapshot(&self) -> DocumentSnapshot;

	/// Number of lines.
	fn line_count(&self) -> u32;

	/// Character length of a line, excluding its terminator.
	fn line_len(&self, line: u32) -> u32;

	/// Returns the word touching `pos`, if any.
	fn word_at(&self, pos: Position) -> Option<WordSpan>;

	/// Ids of decorations owned by `owner` that intersect `range`.
	fn decorations_in_range(&self, range: Range, owner: OwnerId) -> Vec<DecorationId>;

	/// Removes `remove` and adds `add`, all tagged with `owner`.
	///
	/// Returns the new ids in the order of `add`. Unknown ids in `remove`
	/// are ignored.
	fn delta_decorations(&mut self, owner: OwnerId, remove: &[DecorationId], add: Vec<Decoration>) -> Vec<DecorationId>;

	/// Clamps a range into the document.
	fn validate_range(&self, range: Range) -> Range {
		let clamp = |pos: Position| {
			let line = pos.line.min(self.line_count().saturating_sub(1));
			Position::new(line, pos.column.min(self.line_len(line)))
		};
		Range::from_positions(clamp(range.start), clamp(range.end))
	}

	/// Range covering the whole document.
	fn full_range(&self) -> Range {
		let last = self.line_count().saturating_sub(1);
		Range::new(0, 0, last, self.line_len(last))
	}

	/// Range covering one line, excluding its terminator.
	fn line_range(&self, line: u32) -> Range {
		Range::new(line, 0, line, self.line_len(line))
	}
}

/// Model extension used by the viewport semantic tokens consumer.
pub trait SemanticTokenStore: TextModel {
	/// True when tokens for the whole document are already present.
	fn has_complete_semantic_tokens(&self) -> bool;

	/// True when any tokens, partial or complete, are present.
	fn has_some_semantic_tokens(&self) -> bool;

	/// Replaces the tokens inside `range` with `spans`.
	fn set_partial_semantic_tokens(&mut self, range: Range, spans: Vec<SemanticSpan>);

	/// Drops every semantic token.
	fn clear_semantic_tokens(&mut self);
}

/// The editor view an engine instance is attached to.
pub trait EditorSurface {
	/// Model type shown in this editor.
	type Model: TextModel;

	/// Currently bound model.
	fn model(&self) -> Option<&Self::Model>;

	/// Currently bound model, mutably.
	fn model_mut(&mut self) -> Option<&mut Self::Model>;

	/// Visible ranges, including the viewport padding above and below.
	fn visible_ranges(&self) -> Vec<Range>;

	/// Editor font.
	fn font(&self) -> EditorFont;
}

/// Receives activated link targets.
pub trait LinkOpener {
	/// Opens `target`; `open_to_side` requests a side-by-side view.
	fn open(&self, target: &str, open_to_side: bool);
}

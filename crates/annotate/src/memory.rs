//! In-memory host implementing the model and surface traits over a rope.
//!
//! Used by the tests and by embedders that have no buffer of their own.
//! Edits bump the version and carry owned decorations along with the text.

use std::collections::BTreeMap;
use std::sync::Arc;

use vista_primitives::{DocumentKey, DocumentSnapshot, Position, Range, Rope, line_count, line_len};

use crate::model::{Decoration, DecorationId, EditorFont, EditorSurface, OwnerId, SemanticTokenStore, TextModel, WordSpan};
use crate::semantic::SemanticSpan;

#[derive(Debug, Clone)]
struct StoredDecoration {
	owner: OwnerId,
	decoration: Decoration,
}

/// A rope-backed document with a decoration store and semantic token store.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
	key: DocumentKey,
	language: Arc<str>,
	version: u64,
	text: Rope,
	decorations: BTreeMap<DecorationId, StoredDecoration>,
	next_decoration: u64,
	semantic_spans: Vec<SemanticSpan>,
	semantic_complete: bool,
}

impl MemoryDocument {
	/// Creates a document at version 1.
	pub fn new(key: impl Into<DocumentKey>, language: impl Into<Arc<str>>, text: &str) -> Self {
		Self {
			key: key.into(),
			language: language.into(),
			version: 1,
			text: Rope::from(text),
			decorations: BTreeMap::new(),
			next_decoration: 0,
			semantic_spans: Vec::new(),
			semantic_complete: false,
		}
	}

	/// Document text.
	pub fn text(&self) -> &Rope {
		&self.text
	}

	/// Changes the language identifier without touching the text.
	pub fn set_language(&mut self, language: impl Into<Arc<str>>) {
		self.language = language.into();
	}

	/// Replaces `range` with `text`, bumping the version.
	///
	/// Decoration endpoints after the edit shift with the text; endpoints
	/// inside the replaced range collapse onto its start.
	pub fn edit(&mut self, range: Range, text: &str) {
		let range = self.validate_range(range);
		let start = self.char_index(range.start);
		let end = self.char_index(range.end);
		self.text.remove(start..end);
		self.text.insert(start, text);
		let inserted_end = start + text.chars().count();
		let new_end = self.position_of(inserted_end);

		let remap = |pos: Position| -> Position {
			if pos <= range.start {
				pos
			} else if pos < range.end {
				range.start
			} else if pos.line == range.end.line {
				Position::new(new_end.line, new_end.column + (pos.column - range.end.column))
			} else {
				Position::new(pos.line - range.end.line + new_end.line, pos.column)
			}
		};
		for stored in self.decorations.values_mut() {
			let moved = Range::from_positions(remap(stored.decoration.range.start), remap(stored.decoration.range.end));
			stored.decoration.range = moved;
		}
		self.version += 1;
	}

	/// Inserts `text` at `pos`.
	pub fn insert(&mut self, pos: Position, text: &str) {
		self.edit(Range::point(pos), text);
	}

	/// Decorations owned by `owner`, ordered by range then id.
	pub fn decorations(&self, owner: OwnerId) -> Vec<(DecorationId, Decoration)> {
		let mut out: Vec<_> = self
			.decorations
			.iter()
			.filter(|(_, stored)| stored.owner == owner)
			.map(|(id, stored)| (*id, stored.decoration.clone()))
			.collect();
		out.sort_by(|a, b| a.1.range.cmp(&b.1.range).then(a.0.cmp(&b.0)));
		out
	}

	/// A single decoration by id.
	pub fn decoration(&self, id: DecorationId) -> Option<&Decoration> {
		self.decorations.get(&id).map(|stored| &stored.decoration)
	}

	/// Total number of decorations from all owners.
	pub fn decoration_count(&self) -> usize {
		self.decorations.len()
	}

	/// Marks the document as fully tokenized with `spans`.
	pub fn set_complete_semantic_tokens(&mut self, spans: Vec<SemanticSpan>) {
		self.semantic_spans = spans;
		self.semantic_complete = true;
	}

	/// Semantic spans currently stored, ordered by range.
	pub fn semantic_spans(&self) -> &[SemanticSpan] {
		&self.semantic_spans
	}

	fn char_index(&self, pos: Position) -> usize {
		self.text.line_to_char(pos.line as usize) + pos.column as usize
	}

	fn position_of(&self, char_idx: usize) -> Position {
		let line = self.text.char_to_line(char_idx);
		let column = char_idx - self.text.line_to_char(line);
		Position::new(line as u32, column as u32)
	}
}

fn is_word_char(c: char) -> bool {
	c.is_alphanumeric() || c == '_'
}

impl TextModel for MemoryDocument {
	fn key(&self) -> &DocumentKey {
		&self.key
	}

	fn version(&self) -> u64 {
		self.version
	}

	fn language(&self) -> &str {
		&self.language
	}

	fn snapshot(&self) -> DocumentSnapshot {
		DocumentSnapshot::new(self.key.clone(), self.version, self.language.clone(), self.text.clone())
	}

	fn line_count(&self) -> u32 {
		line_count(self.text.slice(..))
	}

	fn line_len(&self, line: u32) -> u32 {
		line_len(self.text.slice(..), line)
	}

	fn word_at(&self, pos: Position) -> Option<WordSpan> {
		if pos.line >= self.line_count() {
			return None;
		}
		let len = self.line_len(pos.line);
		if pos.column > len {
			return None;
		}
		let line: Vec<char> = self.text.line(pos.line as usize).chars().take(len as usize).collect();
		let col = pos.column as usize;
		let touches_right = line.get(col).is_some_and(|&c| is_word_char(c));
		let touches_left = col > 0 && line.get(col - 1).is_some_and(|&c| is_word_char(c));
		if !touches_left && !touches_right {
			return None;
		}
		let mut start = col;
		while start > 0 && is_word_char(line[start - 1]) {
			start -= 1;
		}
		let mut end = col;
		while end < line.len() && is_word_char(line[end]) {
			end += 1;
		}
		Some(WordSpan {
			word: line[start..end].iter().collect(),
			start_column: start as u32,
			end_column: end as u32,
		})
	}

	fn decorations_in_range(&self, range: Range, owner: OwnerId) -> Vec<DecorationId> {
		self.decorations
			.iter()
			.filter(|(_, stored)| stored.owner == owner && stored.decoration.range.intersects(&range))
			.map(|(id, _)| *id)
			.collect()
	}

	fn delta_decorations(&mut self, owner: OwnerId, remove: &[DecorationId], add: Vec<Decoration>) -> Vec<DecorationId> {
		for id in remove {
			if self.decorations.get(id).is_some_and(|stored| stored.owner == owner) {
				self.decorations.remove(id);
			}
		}
		add.into_iter()
			.map(|decoration| {
				self.next_decoration += 1;
				let id = DecorationId(self.next_decoration);
				self.decorations.insert(id, StoredDecoration { owner, decoration });
				id
			})
			.collect()
	}
}

impl SemanticTokenStore for MemoryDocument {
	fn has_complete_semantic_tokens(&self) -> bool {
		self.semantic_complete
	}

	fn has_some_semantic_tokens(&self) -> bool {
		self.semantic_complete || !self.semantic_spans.is_empty()
	}

	fn set_partial_semantic_tokens(&mut self, range: Range, spans: Vec<SemanticSpan>) {
		self.semantic_spans.retain(|span| !range.intersects(&span.range));
		self.semantic_spans.extend(spans);
		self.semantic_spans.sort_by(|a, b| a.range.cmp(&b.range));
		self.semantic_complete = false;
	}

	fn clear_semantic_tokens(&mut self) {
		self.semantic_spans.clear();
		self.semantic_complete = false;
	}
}

/// An editor view over an optional [`MemoryDocument`].
#[derive(Debug, Clone, Default)]
pub struct MemorySurface {
	model: Option<MemoryDocument>,
	visible: Vec<Range>,
	font: EditorFont,
}

impl MemorySurface {
	/// Creates a surface showing `model` with the given visible ranges.
	pub fn new(model: MemoryDocument, visible: Vec<Range>) -> Self {
		Self {
			model: Some(model),
			visible,
			font: EditorFont::default(),
		}
	}

	/// Replaces the bound model, returning the previous one.
	pub fn set_model(&mut self, model: Option<MemoryDocument>) -> Option<MemoryDocument> {
		std::mem::replace(&mut self.model, model)
	}

	/// Replaces the visible ranges (a scroll).
	pub fn set_visible(&mut self, visible: Vec<Range>) {
		self.visible = visible;
	}

	/// Replaces the editor font.
	pub fn set_font(&mut self, font: EditorFont) {
		self.font = font;
	}
}

impl EditorSurface for MemorySurface {
	type Model = MemoryDocument;

	fn model(&self) -> Option<&MemoryDocument> {
		self.model.as_ref()
	}

	fn model_mut(&mut self) -> Option<&mut MemoryDocument> {
		self.model.as_mut()
	}

	fn visible_ranges(&self) -> Vec<Range> {
		self.visible.clone()
	}

	fn font(&self) -> EditorFont {
		self.font.clone()
	}
}

//! Turns merged annotations into owned editor decorations.
//!
//! The reconciler only ever replaces decorations inside the ranges it is
//! asked to refresh. Each rendered segment holds a [`StyleHandle`]; dropping
//! the record releases the style, so a replaced or removed record releases
//! exactly once.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use vista_primitives::{DocumentKey, Position, Range};

use crate::annotation::{Annotation, fix_space};
use crate::config::AnnotationConfig;
use crate::model::{Decoration, DecorationId, EditorFont, OwnerId, Placement, SegmentLink, TextModel};
use crate::style::{Corners, Edges, StyleHandle, StylePool, StyleProps, ThemeColor};

/// Font metrics annotations render with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutInfo {
	/// Font size in pixels.
	pub font_size: u32,
	/// Font family list.
	pub font_family: String,
}

impl LayoutInfo {
	/// Resolves the annotation font against the editor font.
	///
	/// A configured size that is unset, below 5, or larger than the editor
	/// size falls back to 90% of the editor size.
	pub fn resolve(config: &AnnotationConfig, editor: &EditorFont) -> Self {
		let font_size = match config.font_size {
			size if size < 5 || size > editor.size => editor.size * 9 / 10,
			size => size,
		};
		let font_family = if config.font_family.is_empty() {
			editor.family.clone()
		} else {
			config.font_family.clone()
		};
		Self { font_size, font_family }
	}
}

/// The link segment currently under the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLink {
	/// Annotation owning the segment.
	pub annotation: Annotation,
	/// Segment index within the label.
	pub index: usize,
	/// Link target of the segment.
	pub target: String,
}

/// Metadata kept for every decoration the reconciler created.
#[derive(Debug)]
pub struct DecorationRecord {
	annotation: Arc<Annotation>,
	link: Option<SegmentLink>,
	style: StyleHandle,
}

impl DecorationRecord {
	/// Annotation the decoration was rendered from.
	pub fn annotation(&self) -> &Annotation {
		&self.annotation
	}

	/// Link data when the decoration is a link segment.
	pub fn link(&self) -> Option<&SegmentLink> {
		self.link.as_ref()
	}

	/// Style rule name.
	pub fn class_name(&self) -> &str {
		self.style.class_name()
	}
}

/// Owns the decoration records of one controller.
#[derive(Debug)]
pub struct DecorationReconciler {
	owner: OwnerId,
	pool: StylePool,
	document: Option<DocumentKey>,
	records: IndexMap<DecorationId, DecorationRecord>,
	max_decorations: usize,
}

impl DecorationReconciler {
	/// Creates a reconciler with a fresh owner tag.
	pub fn new(pool: StylePool, max_decorations: usize) -> Self {
		Self {
			owner: OwnerId::next(),
			pool,
			document: None,
			records: IndexMap::new(),
			max_decorations,
		}
	}

	/// Tag of every decoration this reconciler writes.
	pub fn owner(&self) -> OwnerId {
		self.owner
	}

	/// Style pool the records acquire from.
	pub fn pool(&self) -> &StylePool {
		&self.pool
	}

	/// Changes the per-render decoration cap.
	pub fn set_max_decorations(&mut self, max: usize) {
		self.max_decorations = max;
	}

	/// Number of live records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// True when nothing is rendered.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Looks up the record behind a decoration id.
	pub fn record(&self, id: DecorationId) -> Option<&DecorationRecord> {
		self.records.get(&id)
	}

	/// Iterates records in creation order.
	pub fn records(&self) -> impl Iterator<Item = (DecorationId, &DecorationRecord)> {
		self.records.iter().map(|(id, record)| (*id, record))
	}

	/// Distinct annotations behind the live records, sorted by anchor.
	pub fn distinct_annotations(&self) -> Vec<Annotation> {
		let distinct: IndexSet<&Annotation> = self.records.values().map(|record| record.annotation.as_ref()).collect();
		let mut out: Vec<Annotation> = distinct.into_iter().cloned().collect();
		out.sort_by_key(|annotation| annotation.position);
		out
	}

	/// Distinct annotations anchored inside `range`, sorted by anchor.
	pub fn annotations_in(&self, range: Range) -> Vec<Annotation> {
		let mut out = self.distinct_annotations();
		out.retain(|annotation| range.contains(annotation.position));
		out
	}

	/// Replaces the decorations inside `ranges` with ones rendered from
	/// `annotations`.
	///
	/// `annotations` must be sorted by anchor; anchors outside `ranges` are
	/// ignored. At most `max_decorations` segments are rendered, later ones
	/// are dropped. Returns the number of decorations added.
	pub fn render<M>(&mut self, model: &mut M, ranges: &[Range], annotations: &[Annotation], layout: &LayoutInfo, active: Option<&ActiveLink>) -> usize
	where
		M: TextModel + ?Sized,
	{
		if self.document.as_ref() != Some(model.key()) {
			self.records.clear();
			self.document = Some(model.key().clone());
		}
		let mut pending: Vec<(Decoration, DecorationRecord)> = Vec::new();
		let in_ranges = |pos: Position| ranges.iter().any(|range| range.contains(pos));

		'annotations: for annotation in annotations.iter().filter(|a| in_ranges(a.position)) {
			let (range, placement, show_if_collapsed) = anchor(&*model, annotation.position);
			let shared = Arc::new(annotation.clone());
			let segments = annotation.segments();
			let last = segments.len().saturating_sub(1);
			for (index, part) in segments.into_iter().enumerate() {
				if pending.len() >= self.max_decorations {
					tracing::debug!(max = self.max_decorations, "annotations.cap");
					break 'annotations;
				}
				let is_active = part.link.as_deref().is_some_and(|target| {
					active.is_some_and(|a| a.index == index && a.target == target && a.annotation == *annotation)
				});
				let style = self.pool.acquire(segment_style(layout, annotation, index, last, part.link.is_some(), is_active));
				let link = part.link.map(|target| SegmentLink { target, index });
				let decoration = Decoration {
					range,
					placement,
					content: fix_space(&part.text),
					class_name: style.class_name().to_string(),
					link: link.clone(),
					show_if_collapsed,
				};
				let record = DecorationRecord {
					annotation: shared.clone(),
					link,
					style,
				};
				pending.push((decoration, record));
			}
		}

		let mut remove = Vec::new();
		for range in ranges {
			for id in model.decorations_in_range(*range, self.owner) {
				if self.records.shift_remove(&id).is_some() {
					remove.push(id);
				}
			}
		}
		self.records.retain(|id, record| {
			let hit = in_ranges(record.annotation.position);
			if hit {
				remove.push(*id);
			}
			!hit
		});

		let (decorations, records): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
		let ids = model.delta_decorations(self.owner, &remove, decorations);
		let added = ids.len();
		tracing::trace!(removed = remove.len(), added, "annotations.render");
		self.records.extend(ids.into_iter().zip(records));
		added
	}

	/// Removes every decoration this reconciler owns in `model`, including
	/// leftovers from an earlier binding, and releases all styles.
	pub fn remove_all<M>(&mut self, model: &mut M)
	where
		M: TextModel + ?Sized,
	{
		let mut ids = model.decorations_in_range(whole_document(&*model), self.owner);
		if self.document.as_ref() == Some(model.key()) {
			ids.extend(self.records.keys().copied());
			ids.sort_unstable();
			ids.dedup();
		}
		if !ids.is_empty() {
			model.delta_decorations(self.owner, &ids, Vec::new());
		}
		self.forget_all();
	}

	/// Releases all styles without touching a model.
	///
	/// Used when the model the records belong to is no longer bound.
	pub fn forget_all(&mut self) {
		self.records.clear();
		self.document = None;
	}
}

/// A range containing every position of `model`, end of document included.
pub(crate) fn whole_document<M>(model: &M) -> Range
where
	M: TextModel + ?Sized,
{
	Range::new(0, 0, model.line_count(), 0)
}

/// Picks the decoration range and side for an anchor.
///
/// Anchors on a word end render after the word and anchors on a word start
/// render before it; both cover the word. Anything else is a zero-width
/// marker that stays visible when collapsed.
fn anchor<M>(model: &M, pos: Position) -> (Range, Placement, bool)
where
	M: TextModel + ?Sized,
{
	let word_range = |start: u32, end: u32| Range::new(pos.line, start, pos.line, end);
	match model.word_at(pos) {
		Some(word) if word.end_column == pos.column => (word_range(word.start_column, word.end_column), Placement::After, false),
		Some(word) if word.start_column == pos.column => (word_range(word.start_column, word.end_column), Placement::Before, false),
		_ => (Range::point(pos), Placement::Before, true),
	}
}

fn segment_style(layout: &LayoutInfo, annotation: &Annotation, index: usize, last: usize, is_link: bool, is_active: bool) -> StyleProps {
	let size = layout.font_size;
	let margin_before = if annotation.padding_left { size / 3 } else { 0 };
	let margin_after = if annotation.padding_right { size / 3 } else { 0 };
	let padding = (size / 4).max(1);
	let radius = size / 4;

	let (margin, padding, border_radius) = match (index == 0, index == last) {
		(true, true) => (Edges::new(0, margin_after, 0, margin_before), Edges::new(1, padding, 1, padding), Corners::all(radius)),
		(true, false) => (Edges::new(0, 0, 0, margin_before), Edges::new(1, 0, 0, padding), Corners::new(radius, 0, 0, radius)),
		(false, true) => (Edges::new(0, margin_after, 0, 0), Edges::new(1, padding, 0, 0), Corners::new(0, radius, radius, 0)),
		(false, false) => (Edges::default(), Edges::new(1, 0, 1, 0), Corners::default()),
	};

	let (foreground, background) = ThemeColor::for_kind(annotation.kind);
	StyleProps {
		font_size: size,
		font_family: layout.font_family.clone(),
		foreground: if is_active { ThemeColor::ActiveLinkForeground } else { foreground },
		background,
		underline: is_link,
		pointer_cursor: is_active,
		margin,
		padding,
		border_radius,
	}
}

//! Viewport range tracking.
//!
//! Turns the editor's visible ranges into the minimal set of document ranges
//! to annotate: each visible range is widened by a line margin, clamped to
//! the document, and overlapping or touching ranges are merged. A range
//! reaching the last position of the document is extended past it so that
//! an anchor at the very end still falls inside.

use vista_primitives::Range;

use crate::model::TextModel;
use crate::reconcile::whole_document;

/// Computes the ranges to annotate for the model's current viewport.
///
/// An empty `visible` list yields no ranges.
pub fn annotation_ranges<M>(model: &M, visible: &[Range], margin_lines: u32) -> Vec<Range>
where
	M: TextModel + ?Sized,
{
	let end = model.full_range().end;
	let mut ranges = merge_ranges(visible, margin_lines, |r| model.validate_range(r));
	if let Some(last) = ranges.last_mut().filter(|r| r.end == end) {
		last.end = whole_document(model).end;
	}
	ranges
}

/// Widens, validates and merges ranges.
///
/// The result is sorted by start and no two ranges overlap or touch.
pub fn merge_ranges(visible: &[Range], margin_lines: u32, validate: impl Fn(Range) -> Range) -> Vec<Range> {
	let mut sorted = visible.to_vec();
	sorted.sort();

	let mut result: Vec<Range> = Vec::with_capacity(sorted.len());
	for range in sorted {
		let extended = validate(range.extend_lines(margin_lines, margin_lines));
		match result.last_mut() {
			Some(last) if last.intersects_or_touches(&extended) => *last = last.plus(&extended),
			_ => result.push(extended),
		}
	}
	result
}

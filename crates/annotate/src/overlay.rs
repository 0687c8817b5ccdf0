//! Pointer interaction with rendered annotation links.
//!
//! Hovering a link segment with the trigger modifier held re-renders that
//! segment's line with the link marked active; leaving, releasing the
//! modifier, or hovering anything else re-renders the line plain. Nothing
//! here fetches.

use vista_primitives::Range;

use crate::model::{DecorationId, LinkOpener, TextModel};
use crate::reconcile::{ActiveLink, DecorationReconciler, LayoutInfo};

/// What the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
	/// Document text, with the injected decoration under the pointer if any.
	Content(Option<DecorationId>),
	/// Gutter, scrollbar, widgets or outside the editor.
	Other,
}

/// A pointer move, key change or click resolved against the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
	/// Hit-test result.
	pub target: PointerTarget,
	/// The link trigger modifier is held.
	pub trigger_modifier: bool,
	/// The side-by-side modifier is held.
	pub side_by_side_modifier: bool,
}

impl PointerEvent {
	/// Pointer over decoration `id` with the trigger modifier held.
	pub fn over(id: DecorationId) -> Self {
		Self {
			target: PointerTarget::Content(Some(id)),
			trigger_modifier: true,
			side_by_side_modifier: false,
		}
	}

	fn decoration(&self) -> Option<DecorationId> {
		match self.target {
			PointerTarget::Content(id) if self.trigger_modifier => id,
			_ => None,
		}
	}
}

/// Active-link state for one controller.
#[derive(Debug, Default)]
pub struct InteractionOverlay {
	active: Option<ActiveLink>,
}

impl InteractionOverlay {
	/// Creates an overlay with no active link.
	pub fn new() -> Self {
		Self::default()
	}

	/// The link currently rendered active.
	pub fn active(&self) -> Option<&ActiveLink> {
		self.active.as_ref()
	}

	/// Forgets the active link without re-rendering.
	///
	/// Used when the decorations it refers to are being torn down anyway.
	pub fn reset(&mut self) {
		self.active = None;
	}

	/// Handles a pointer move or modifier change.
	///
	/// Returns true if any line was re-rendered.
	pub fn hover<M>(&mut self, event: &PointerEvent, model: &mut M, reconciler: &mut DecorationReconciler, layout: &LayoutInfo) -> bool
	where
		M: TextModel + ?Sized,
	{
		let next = event.decoration().and_then(|id| {
			let record = reconciler.record(id)?;
			let link = record.link()?;
			Some(ActiveLink {
				annotation: record.annotation().clone(),
				index: link.index,
				target: link.target.clone(),
			})
		});

		let Some(next) = next else {
			return self.clear(model, reconciler, layout);
		};
		if self.active.as_ref() == Some(&next) {
			return false;
		}
		self.clear(model, reconciler, layout);

		let range = line_span(next.annotation.position.line);
		let annotations = reconciler.annotations_in(range);
		tracing::trace!(link = %next.target, line = range.start.line, "annotation.link.hover");
		reconciler.render(model, &[range], &annotations, layout, Some(&next));
		self.active = Some(next);
		true
	}

	/// Reverts the active link, if any, to normal rendering.
	///
	/// Returns true if a line was re-rendered.
	pub fn clear<M>(&mut self, model: &mut M, reconciler: &mut DecorationReconciler, layout: &LayoutInfo) -> bool
	where
		M: TextModel + ?Sized,
	{
		let Some(active) = self.active.take() else {
			return false;
		};
		let range = line_span(active.annotation.position.line);
		let annotations = reconciler.annotations_in(range);
		reconciler.render(model, &[range], &annotations, layout, None);
		true
	}

	/// Dispatches a click on a link segment to `opener`.
	///
	/// Returns true if a link was opened.
	pub fn activate(&self, event: &PointerEvent, reconciler: &DecorationReconciler, opener: &dyn LinkOpener) -> bool {
		let Some(link) = event.decoration().and_then(|id| reconciler.record(id)).and_then(|record| record.link()) else {
			return false;
		};
		tracing::debug!(link = %link.target, side = event.side_by_side_modifier, "annotation.link.open");
		opener.open(&link.target, event.side_by_side_modifier);
		true
	}
}

/// The whole of `line` including a label anchored at its end.
fn line_span(line: u32) -> Range {
	Range::new(line, 0, line.saturating_add(1), 0)
}

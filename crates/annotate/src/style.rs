//! Reference-counted style rules for annotation decorations.
//!
//! Every distinct [`StyleProps`] maps to one named rule. Acquiring the same
//! properties again shares the rule; the rule is removed when its last
//! [`StyleHandle`] is dropped, so each handle releases exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::annotation::AnnotationKind;

/// Theme color slots used by annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeColor {
	/// Foreground for annotations without a specific kind.
	HintForeground,
	/// Background for annotations without a specific kind.
	HintBackground,
	/// Foreground for parameter annotations.
	ParameterForeground,
	/// Background for parameter annotations.
	ParameterBackground,
	/// Foreground for type annotations.
	TypeForeground,
	/// Background for type annotations.
	TypeBackground,
	/// Foreground of the link under the pointer.
	ActiveLinkForeground,
}

impl ThemeColor {
	/// Foreground and background slots for an annotation kind.
	pub fn for_kind(kind: AnnotationKind) -> (Self, Self) {
		match kind {
			AnnotationKind::Parameter => (Self::ParameterForeground, Self::ParameterBackground),
			AnnotationKind::Type => (Self::TypeForeground, Self::TypeBackground),
			AnnotationKind::Other => (Self::HintForeground, Self::HintBackground),
		}
	}
}

/// Pixel sizes for the four sides of a box, clockwise from the top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Edges {
	/// Top edge.
	pub top: u32,
	/// Right edge.
	pub right: u32,
	/// Bottom edge.
	pub bottom: u32,
	/// Left edge.
	pub left: u32,
}

impl Edges {
	/// Creates edges in CSS order.
	pub const fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
		Self { top, right, bottom, left }
	}
}

/// Corner radii, clockwise from the top left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Corners {
	/// Top-left radius.
	pub top_left: u32,
	/// Top-right radius.
	pub top_right: u32,
	/// Bottom-right radius.
	pub bottom_right: u32,
	/// Bottom-left radius.
	pub bottom_left: u32,
}

impl Corners {
	/// Same radius on every corner.
	pub const fn all(radius: u32) -> Self {
		Self::new(radius, radius, radius, radius)
	}

	/// Creates radii in CSS order.
	pub const fn new(top_left: u32, top_right: u32, bottom_right: u32, bottom_left: u32) -> Self {
		Self {
			top_left,
			top_right,
			bottom_right,
			bottom_left,
		}
	}
}

/// Full property set of one annotation segment style.
///
/// Equal property sets share a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleProps {
	/// Font size in pixels.
	pub font_size: u32,
	/// Font family list.
	pub font_family: String,
	/// Text color.
	pub foreground: ThemeColor,
	/// Box color.
	pub background: ThemeColor,
	/// Underline the text (link segments).
	pub underline: bool,
	/// Show a pointer cursor (active link).
	pub pointer_cursor: bool,
	/// Outer spacing.
	pub margin: Edges,
	/// Inner spacing.
	pub padding: Edges,
	/// Corner rounding.
	pub border_radius: Corners,
}

struct Rule {
	class_name: String,
	refs: usize,
}

#[derive(Default)]
struct PoolState {
	rules: HashMap<StyleProps, Rule>,
	next_id: u64,
}

/// Deduplicating pool of style rules.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone, Default)]
pub struct StylePool {
	inner: Arc<Mutex<PoolState>>,
}

impl std::fmt::Debug for StylePool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StylePool").field("live_rules", &self.live_rules()).finish()
	}
}

impl StylePool {
	/// Creates an empty pool.
	pub fn new() -> Self {
		Self::default()
	}

	/// Acquires the rule for `props`, creating it on first use.
	pub fn acquire(&self, props: StyleProps) -> StyleHandle {
		let mut state = self.inner.lock();
		let next_id = state.next_id;
		let rule = state.rules.entry(props.clone()).or_insert_with(|| Rule {
			class_name: format!("vista-annotation-{next_id}"),
			refs: 0,
		});
		rule.refs += 1;
		let class_name = rule.class_name.clone();
		if rule.refs == 1 {
			state.next_id += 1;
		}
		StyleHandle {
			pool: Arc::downgrade(&self.inner),
			props,
			class_name,
		}
	}

	/// Number of rules with at least one live handle.
	pub fn live_rules(&self) -> usize {
		self.inner.lock().rules.len()
	}

	/// Properties of the rule named `class_name`, if it is live.
	pub fn lookup(&self, class_name: &str) -> Option<StyleProps> {
		self.inner
			.lock()
			.rules
			.iter()
			.find(|(_, rule)| rule.class_name == class_name)
			.map(|(props, _)| props.clone())
	}
}

/// Owned reference to a pooled style rule; releases it on drop.
#[must_use = "dropping the handle releases the style rule"]
pub struct StyleHandle {
	pool: Weak<Mutex<PoolState>>,
	props: StyleProps,
	class_name: String,
}

impl std::fmt::Debug for StyleHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StyleHandle").field("class_name", &self.class_name).finish()
	}
}

impl StyleHandle {
	/// Name renderers use to refer to the rule.
	pub fn class_name(&self) -> &str {
		&self.class_name
	}

	/// Properties of the rule.
	pub fn props(&self) -> &StyleProps {
		&self.props
	}
}

impl Drop for StyleHandle {
	fn drop(&mut self) {
		let Some(pool) = self.pool.upgrade() else {
			return;
		};
		let mut state = pool.lock();
		let remove = match state.rules.get_mut(&self.props) {
			Some(rule) => {
				rule.refs -= 1;
				rule.refs == 0
			}
			None => false,
		};
		if remove {
			state.rules.remove(&self.props);
		}
	}
}

//! Provider-produced annotations and their label segments.
//!
//! An [`Annotation`] is a value: two annotations with the same anchor, label,
//! kind and padding compare equal no matter which provider call produced
//! them. The result cache and the decoration reconciler rely on this.

use std::sync::LazyLock;

use lsp_types::{InlayHint, InlayHintKind, InlayHintLabel};
use regex::Regex;
use vista_primitives::Position;

/// Presentation category of an annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
	/// Parameter name hint.
	Parameter,
	/// Inferred type hint.
	Type,
	/// Anything else.
	#[default]
	Other,
}

impl From<InlayHintKind> for AnnotationKind {
	fn from(kind: InlayHintKind) -> Self {
		if kind == InlayHintKind::PARAMETER {
			Self::Parameter
		} else if kind == InlayHintKind::TYPE {
			Self::Type
		} else {
			Self::Other
		}
	}
}

/// One piece of a structured label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelPart {
	/// Display text.
	pub text: String,
	/// Optional activation target (URL or `command:` link).
	pub link: Option<String>,
}

impl LabelPart {
	/// Creates a non-interactive part.
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			link: None,
		}
	}

	/// Creates an interactive part.
	pub fn link(text: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			link: Some(target.into()),
		}
	}
}

/// Annotation payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationLabel {
	/// Plain text; markdown-style `[label](target)` links become
	/// interactive segments.
	Text(String),
	/// Pre-split structured segments, used as given.
	Parts(Vec<LabelPart>),
}

/// A position-anchored piece of auxiliary information.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
	/// Anchor position in the document.
	pub position: Position,
	/// Displayed payload.
	pub label: AnnotationLabel,
	/// Presentation category.
	pub kind: AnnotationKind,
	/// Render a gap before the label.
	pub padding_left: bool,
	/// Render a gap after the label.
	pub padding_right: bool,
}

impl Annotation {
	/// Creates a plain-text annotation with no padding.
	pub fn new(position: Position, text: impl Into<String>, kind: AnnotationKind) -> Self {
		Self {
			position,
			label: AnnotationLabel::Text(text.into()),
			kind,
			padding_left: false,
			padding_right: false,
		}
	}

	/// Sets the padding flags.
	pub fn with_padding(mut self, left: bool, right: bool) -> Self {
		self.padding_left = left;
		self.padding_right = right;
		self
	}

	/// Splits the label into render segments.
	pub fn segments(&self) -> Vec<LabelPart> {
		match &self.label {
			AnnotationLabel::Text(text) => parse_linked_text(text),
			AnnotationLabel::Parts(parts) => parts.clone(),
		}
	}

	/// Converts an LSP inlay hint.
	///
	/// LSP character offsets are taken as columns. Label parts that carry a
	/// command become `command:` links; parts with a location link to the
	/// location's URI.
	pub fn from_lsp(hint: InlayHint) -> Self {
		let label = match hint.label {
			InlayHintLabel::String(text) => AnnotationLabel::Text(text),
			InlayHintLabel::LabelParts(parts) => AnnotationLabel::Parts(
				parts
					.into_iter()
					.map(|part| {
						let link = part
							.command
							.map(|cmd| format!("command:{}", cmd.command))
							.or_else(|| part.location.map(|loc| loc.uri.as_str().to_string()));
						LabelPart { text: part.value, link }
					})
					.collect(),
			),
		};
		Self {
			position: Position::new(hint.position.line, hint.position.character),
			label,
			kind: hint.kind.map(AnnotationKind::from).unwrap_or_default(),
			padding_left: hint.padding_left.unwrap_or(false),
			padding_right: hint.padding_right.unwrap_or(false),
		}
	}
}

static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(?i)\[([^\]]+)\]\(((?:https?://|command:)[^)\s]+)(?: (?:"[^"]+"|'[^']+'))?\)"#)
		.expect("link pattern is valid")
});

/// Splits text with markdown-style links into segments.
///
/// Only `http://`, `https://` and `command:` targets are recognised; an
/// optional quoted title after the target is accepted and discarded.
/// Returns a single plain segment when there are no links.
pub fn parse_linked_text(text: &str) -> Vec<LabelPart> {
	let mut parts = Vec::new();
	let mut last = 0;
	for caps in LINK_PATTERN.captures_iter(text) {
		let (Some(whole), Some(label), Some(target)) = (caps.get(0), caps.get(1), caps.get(2)) else {
			continue;
		};
		if whole.start() > last {
			parts.push(LabelPart::text(&text[last..whole.start()]));
		}
		parts.push(LabelPart::link(label.as_str(), target.as_str()));
		last = whole.end();
	}
	if last < text.len() || parts.is_empty() {
		parts.push(LabelPart::text(&text[last..]));
	}
	parts
}

/// Replaces spaces and tabs with no-break spaces so rendered content keeps
/// its width.
pub fn fix_space(text: &str) -> String {
	text.replace([' ', '\t'], "\u{a0}")
}

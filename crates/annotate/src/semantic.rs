//! Viewport semantic tokens.
//!
//! When a document has no full semantic tokens yet, [`ViewportTokenizer`]
//! asks a range provider for the visible ranges only and stores the answers
//! as partial tokens. Requests record the document version they were issued
//! at; an answer for an older version, a cancelled request, or a rebound
//! model is dropped on arrival.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use lsp_types::{SemanticToken, SemanticTokensLegend};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vista_primitives::{DocumentKey, DocumentSnapshot, Position, Range, Rope, line_count, line_len};

use crate::config::SemanticTokensConfig;
use crate::error::ProviderError;
use crate::fetch::panic_message;
use crate::model::{EditorSurface, SemanticTokenStore, TextModel};
use crate::provider::{ProviderRegistry, forward_changes};
use crate::scheduler::{DebounceScheduler, sleep_until};

/// A decoded semantic token with absolute coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticSpan {
	/// Token extent on a single line.
	pub range: Range,
	/// Token type name from the provider legend.
	pub token_type: String,
	/// Modifier names from the provider legend.
	pub modifiers: Vec<String>,
}

/// A source of semantic tokens for document ranges.
#[async_trait]
pub trait RangeTokensProvider: Send + Sync {
	/// Legend the provider's token type and modifier indices refer to.
	fn legend(&self) -> SemanticTokensLegend;

	/// Computes relative-encoded tokens for `range` of `doc`.
	async fn provide_range_tokens(
		&self,
		doc: &DocumentSnapshot,
		range: Range,
		cancel: &CancellationToken,
	) -> Result<Option<Vec<SemanticToken>>, ProviderError>;
}

/// Registry of range semantic token providers.
pub type TokensRegistry = ProviderRegistry<dyn RangeTokensProvider>;

/// Decodes LSP relative-encoded tokens into absolute spans.
///
/// Each token is `(delta_line, delta_start, length, token_type,
/// modifier_bits)`. Tokens starting past the document end or naming a type
/// outside the legend are skipped; lengths running past the line end are
/// clamped to it. Decoding stops at the first delta that overflows.
pub fn decode_semantic_tokens(tokens: &[SemanticToken], text: &Rope, legend: &SemanticTokensLegend) -> Vec<SemanticSpan> {
	let mut spans = Vec::with_capacity(tokens.len());
	let mut line: u32 = 0;
	let mut start: u32 = 0;
	let total_lines = line_count(text.slice(..));

	for token in tokens {
		let next = if token.delta_line > 0 {
			line.checked_add(token.delta_line).map(|line| (line, token.delta_start))
		} else {
			start.checked_add(token.delta_start).map(|start| (line, start))
		};
		let Some((next_line, next_start)) = next else {
			tracing::warn!(decoded = spans.len(), "semantic tokens overflow document coordinates");
			break;
		};
		(line, start) = (next_line, next_start);
		if line >= total_lines {
			continue;
		}
		let Some(token_type) = legend.token_types.get(token.token_type as usize) else {
			continue;
		};
		let end = start.saturating_add(token.length).min(line_len(text.slice(..), line));
		if start >= end {
			continue;
		}
		let modifiers = legend
			.token_modifiers
			.iter()
			.enumerate()
			.filter(|(bit, _)| *bit < 32 && token.token_modifiers_bitset & (1 << bit) != 0)
			.map(|(_, modifier)| modifier.as_str().to_string())
			.collect();
		spans.push(SemanticSpan {
			range: Range::from_positions(Position::new(line, start), Position::new(line, end)),
			token_type: token_type.as_str().to_string(),
			modifiers,
		});
	}
	spans
}

enum TokenSignal {
	Settled {
		key: DocumentKey,
		version: u64,
		range: Range,
		cancel: CancellationToken,
		spans: Vec<SemanticSpan>,
	},
	RegistryChanged,
}

/// Debounced range semantic tokens for the visible part of a document.
///
/// The host forwards editor events and drives the tokenizer with
/// [`step`](Self::step) or [`poll`](Self::poll).
pub struct ViewportTokenizer {
	registry: Arc<TokensRegistry>,
	config: SemanticTokensConfig,
	scheduler: DebounceScheduler,
	lifetime: CancellationToken,
	outstanding: CancellationToken,
	pending: usize,
	signals_tx: mpsc::UnboundedSender<TokenSignal>,
	signals_rx: mpsc::UnboundedReceiver<TokenSignal>,
	disposed: bool,
}

impl std::fmt::Debug for ViewportTokenizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ViewportTokenizer")
			.field("scheduled", &self.scheduler.is_scheduled())
			.field("pending", &self.pending)
			.field("disposed", &self.disposed)
			.finish_non_exhaustive()
	}
}

impl ViewportTokenizer {
	/// Creates a tokenizer and schedules a first run.
	///
	/// Must be called within a tokio runtime.
	pub fn new(registry: Arc<TokensRegistry>, config: SemanticTokensConfig) -> Self {
		let lifetime = CancellationToken::new();
		let (signals_tx, signals_rx) = mpsc::unbounded_channel();
		forward_changes(registry.subscribe(), lifetime.clone(), signals_tx.clone(), || TokenSignal::RegistryChanged);
		let mut scheduler = DebounceScheduler::new(Duration::from_millis(config.delay_ms));
		scheduler.schedule(Instant::now());
		Self {
			registry,
			config,
			scheduler,
			outstanding: lifetime.child_token(),
			lifetime,
			pending: 0,
			signals_tx,
			signals_rx,
			disposed: false,
		}
	}

	/// Number of provider requests that have not settled yet.
	pub fn pending_requests(&self) -> usize {
		self.pending
	}

	/// Returns true if a run is pending.
	pub fn is_scheduled(&self) -> bool {
		self.scheduler.is_scheduled()
	}

	/// The viewport moved.
	pub fn on_scrolled(&mut self) {
		self.schedule();
	}

	/// The document text changed.
	pub fn on_content_changed(&mut self) {
		self.cancel_all_and_schedule();
	}

	/// A different model was bound to the editor.
	pub fn on_model_changed(&mut self) {
		self.cancel_all_and_schedule();
	}

	/// The color theme changed.
	pub fn on_theme_changed(&mut self) {
		self.cancel_all_and_schedule();
	}

	/// Semantic token settings changed.
	pub fn on_config_changed(&mut self, config: SemanticTokensConfig) {
		self.scheduler.set_delay(Duration::from_millis(config.delay_ms));
		self.config = config;
		self.cancel_all_and_schedule();
	}

	/// Cancels everything for good. Later calls do nothing.
	pub fn dispose(&mut self) {
		if std::mem::replace(&mut self.disposed, true) {
			return;
		}
		self.scheduler.cancel();
		self.lifetime.cancel();
		tracing::debug!("semantic_tokens.dispose");
	}

	/// Handles settled requests and a due run without waiting.
	pub fn poll<S>(&mut self, surface: &mut S)
	where
		S: EditorSurface,
		S::Model: SemanticTokenStore,
	{
		while let Ok(signal) = self.signals_rx.try_recv() {
			self.handle(signal, surface);
		}
		if self.scheduler.take_due(Instant::now()) {
			self.run(surface);
		}
	}

	/// Waits for the next settled request or the pending run, then handles it.
	pub async fn step<S>(&mut self, surface: &mut S)
	where
		S: EditorSurface,
		S::Model: SemanticTokenStore,
	{
		let deadline = self.scheduler.deadline();
		tokio::select! {
			biased;
			Some(signal) = self.signals_rx.recv() => self.handle(signal, surface),
			_ = sleep_until(deadline) => {
				if self.scheduler.take_due(Instant::now()) {
					self.run(surface);
				}
			}
		}
	}

	/// Steps until nothing is scheduled or outstanding.
	pub async fn run_until_idle<S>(&mut self, surface: &mut S)
	where
		S: EditorSurface,
		S::Model: SemanticTokenStore,
	{
		while !self.disposed && (self.scheduler.is_scheduled() || self.pending > 0) {
			self.step(surface).await;
		}
	}

	fn schedule(&mut self) {
		if !self.disposed {
			self.scheduler.schedule(Instant::now());
		}
	}

	fn cancel_all_and_schedule(&mut self) {
		if self.disposed {
			return;
		}
		self.outstanding.cancel();
		self.outstanding = self.lifetime.child_token();
		self.schedule();
	}

	fn handle<S>(&mut self, signal: TokenSignal, surface: &mut S)
	where
		S: EditorSurface,
		S::Model: SemanticTokenStore,
	{
		match signal {
			TokenSignal::RegistryChanged => self.cancel_all_and_schedule(),
			TokenSignal::Settled {
				key,
				version,
				range,
				cancel,
				spans,
			} => {
				self.pending = self.pending.saturating_sub(1);
				if self.disposed || cancel.is_cancelled() || spans.is_empty() {
					return;
				}
				let Some(model) = surface.model_mut() else {
					return;
				};
				if model.key() != &key || model.version() != version {
					tracing::trace!(doc = %key, version, current = model.version(), "semantic_tokens.stale");
					return;
				}
				tracing::trace!(doc = %key, %range, spans = spans.len(), "semantic_tokens.apply");
				model.set_partial_semantic_tokens(range, spans);
			}
		}
	}

	fn run<S>(&mut self, surface: &mut S)
	where
		S: EditorSurface,
		S::Model: SemanticTokenStore,
	{
		if self.disposed {
			return;
		}
		let visible = surface.visible_ranges();
		let Some(model) = surface.model_mut() else {
			return;
		};
		if model.has_complete_semantic_tokens() {
			return;
		}
		let provider = self.registry.ordered(model.language()).pop();
		let provider = match provider {
			Some(entry) if self.config.enabled => entry,
			_ => {
				if model.has_some_semantic_tokens() {
					model.clear_semantic_tokens();
				}
				return;
			}
		};

		let snapshot = model.snapshot();
		let legend = provider.provider.legend();
		tracing::debug!(doc = %snapshot.key(), version = snapshot.version(), provider = %provider.id, ranges = visible.len(), "semantic_tokens.run");
		for range in visible {
			let range = model.validate_range(range);
			let cancel = self.outstanding.clone();
			let source = Arc::clone(&provider.provider);
			let snapshot = snapshot.clone();
			let legend = legend.clone();
			let tx = self.signals_tx.clone();
			self.pending += 1;
			tokio::spawn(async move {
				let call = AssertUnwindSafe(async {
					let tokens = source.provide_range_tokens(&snapshot, range, &cancel).await?;
					Ok::<_, ProviderError>(decode_semantic_tokens(&tokens.unwrap_or_default(), snapshot.text(), &legend))
				})
				.catch_unwind();
				let spans = match call.await.unwrap_or_else(|panic| Err(ProviderError::Panicked(panic_message(panic.as_ref())))) {
					Ok(spans) => spans,
					Err(error) => {
						tracing::warn!(doc = %snapshot.key(), %range, %error, "semantic tokens provider failed");
						Vec::new()
					}
				};
				let _ = tx.send(TokenSignal::Settled {
					key: snapshot.key().clone(),
					version: snapshot.version(),
					range,
					cancel,
					spans,
				});
			});
		}
	}
}

impl Drop for ViewportTokenizer {
	fn drop(&mut self) {
		self.lifetime.cancel();
	}
}

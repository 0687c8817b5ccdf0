//! Per-editor annotation controller.
//!
//! The controller owns the request ledger, result cache, adaptive delays,
//! debounce scheduler and decoration records for one editor. The host
//! forwards editor events to it and drives it with [`step`] (async) or
//! [`poll`] (non-blocking); fetches run as spawned tasks and report back
//! over a channel, so shared state is only touched from those two calls.
//!
//! A session starts on attach and restarts on model, language, registry,
//! configuration and theme changes. Restarting cancels every outstanding
//! fetch, clears owned decorations, renders the cached result for the
//! document's current version if there is one, and schedules a fetch.
//!
//! [`step`]: AnnotationController::step
//! [`poll`]: AnnotationController::poll

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vista_primitives::{DocumentKey, Range};

use crate::annotation::Annotation;
use crate::cache::ResultCache;
use crate::config::AnnotationConfig;
use crate::delays::RequestDelays;
use crate::fetch::{AnnotationRegistry, FetchReport, fetch_annotations};
use crate::ledger::RequestLedger;
use crate::model::{EditorSurface, LinkOpener, TextModel};
use crate::overlay::{InteractionOverlay, PointerEvent};
use crate::provider::{ProviderId, forward_changes};
use crate::reconcile::{DecorationReconciler, LayoutInfo, whole_document};
use crate::scheduler::{DebounceScheduler, sleep_until};
use crate::style::StylePool;
use crate::viewport::annotation_ranges;

/// Where the controller is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
	/// Nothing pending or running.
	Idle,
	/// A fetch is debounced and waiting for its deadline.
	Scheduled,
	/// A fetch is running and nothing newer is scheduled.
	Fetching,
	/// Torn down; every call is a no-op.
	Disposed,
}

/// How the last settled fetch cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
	/// Decorations and cache were updated.
	Applied,
	/// Cancelled, superseded or stale; nothing was touched.
	Cancelled,
	/// Every provider request failed; existing decorations were kept.
	Failed,
}

enum Signal {
	Settled {
		cycle: u64,
		key: DocumentKey,
		report: Option<FetchReport>,
		elapsed: Duration,
	},
	ProviderChanged {
		session: u64,
		provider: ProviderId,
	},
	RegistryChanged,
}

struct Cycle {
	id: u64,
	key: DocumentKey,
	version: u64,
	ranges: Vec<Range>,
	cancel: CancellationToken,
}

/// Fetches, caches and renders annotations for one editor.
pub struct AnnotationController {
	registry: Arc<AnnotationRegistry>,
	config: AnnotationConfig,
	opener: Option<Arc<dyn LinkOpener>>,
	ledger: RequestLedger,
	cache: ResultCache,
	delays: RequestDelays,
	scheduler: DebounceScheduler,
	reconciler: DecorationReconciler,
	overlay: InteractionOverlay,
	lifetime: CancellationToken,
	session: CancellationToken,
	session_id: u64,
	session_doc: Option<DocumentKey>,
	cycle: Option<Cycle>,
	next_cycle: u64,
	last_outcome: Option<CycleOutcome>,
	signals_tx: mpsc::UnboundedSender<Signal>,
	signals_rx: mpsc::UnboundedReceiver<Signal>,
	disposed: bool,
}

impl std::fmt::Debug for AnnotationController {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AnnotationController")
			.field("state", &self.state())
			.field("session_doc", &self.session_doc)
			.field("records", &self.reconciler.len())
			.finish_non_exhaustive()
	}
}

impl AnnotationController {
	/// Attaches a controller to `surface` and starts the first session.
	///
	/// Must be called within a tokio runtime.
	pub fn attach<S: EditorSurface>(surface: &mut S, registry: Arc<AnnotationRegistry>, config: AnnotationConfig) -> Self {
		let lifetime = CancellationToken::new();
		let (signals_tx, signals_rx) = mpsc::unbounded_channel();
		forward_changes(registry.subscribe(), lifetime.clone(), signals_tx.clone(), || Signal::RegistryChanged);

		let mut controller = Self {
			ledger: RequestLedger::new(),
			cache: ResultCache::new(config.cache_capacity()),
			delays: RequestDelays::new(config.min_delay(), config.max_delay()),
			scheduler: DebounceScheduler::new(config.min_delay()),
			reconciler: DecorationReconciler::new(StylePool::new(), config.max_decorations),
			overlay: InteractionOverlay::new(),
			registry,
			config,
			opener: None,
			session: lifetime.child_token(),
			lifetime,
			session_id: 0,
			session_doc: None,
			cycle: None,
			next_cycle: 0,
			last_outcome: None,
			signals_tx,
			signals_rx,
			disposed: false,
		};
		controller.update(surface);
		controller
	}

	/// Sets the handler that receives activated links.
	pub fn with_opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
		self.opener = Some(opener);
		self
	}

	/// Current state.
	pub fn state(&self) -> ControllerState {
		if self.disposed {
			ControllerState::Disposed
		} else if self.scheduler.is_scheduled() {
			ControllerState::Scheduled
		} else if self.cycle.is_some() {
			ControllerState::Fetching
		} else {
			ControllerState::Idle
		}
	}

	/// Outcome of the most recently settled cycle.
	pub fn last_outcome(&self) -> Option<CycleOutcome> {
		self.last_outcome
	}

	/// Debounce delay the next schedule will use.
	pub fn delay(&self) -> Duration {
		self.scheduler.delay()
	}

	/// Active configuration.
	pub fn config(&self) -> &AnnotationConfig {
		&self.config
	}

	/// In-flight request bookkeeping.
	pub fn ledger(&self) -> &RequestLedger {
		&self.ledger
	}

	/// Live decoration records.
	pub fn reconciler(&self) -> &DecorationReconciler {
		&self.reconciler
	}

	/// Cached annotations for the model's current version.
	pub fn cached<M: TextModel + ?Sized>(&mut self, model: &M) -> Option<Arc<[Annotation]>> {
		self.cache.get(model)
	}

	/// The document text changed.
	pub fn on_content_changed(&mut self) {
		self.schedule("content");
	}

	/// The viewport scrolled or resized.
	pub fn on_scrolled(&mut self) {
		self.schedule("scroll");
	}

	/// A different model (or none) was bound to the editor.
	pub fn on_model_changed<S: EditorSurface>(&mut self, surface: &mut S) {
		self.update(surface);
	}

	/// The bound model's language changed.
	pub fn on_language_changed<S: EditorSurface>(&mut self, surface: &mut S) {
		self.update(surface);
	}

	/// The color theme changed.
	pub fn on_theme_changed<S: EditorSurface>(&mut self, surface: &mut S) {
		self.update(surface);
	}

	/// Replaces the configuration and restarts the session.
	pub fn on_config_changed<S: EditorSurface>(&mut self, surface: &mut S, config: AnnotationConfig) {
		if config.min_delay_ms != self.config.min_delay_ms || config.max_delay_ms != self.config.max_delay_ms {
			self.delays = RequestDelays::new(config.min_delay(), config.max_delay());
		}
		self.cache.resize(config.cache_capacity());
		self.reconciler.set_max_decorations(config.max_decorations);
		self.config = config;
		self.update(surface);
	}

	/// Pointer moved or a modifier changed.
	///
	/// Returns true if decorations were re-rendered.
	pub fn on_pointer_move<S: EditorSurface>(&mut self, surface: &mut S, event: &PointerEvent) -> bool {
		if self.disposed {
			return false;
		}
		let layout = LayoutInfo::resolve(&self.config, &surface.font());
		let Some(model) = surface.model_mut() else {
			return false;
		};
		self.overlay.hover(event, model, &mut self.reconciler, &layout)
	}

	/// The link gesture was cancelled (pointer left the editor, focus lost).
	pub fn on_pointer_cancel<S: EditorSurface>(&mut self, surface: &mut S) -> bool {
		if self.disposed {
			return false;
		}
		let layout = LayoutInfo::resolve(&self.config, &surface.font());
		let Some(model) = surface.model_mut() else {
			return false;
		};
		self.overlay.clear(model, &mut self.reconciler, &layout)
	}

	/// A click; opens the link under the pointer when the trigger modifier
	/// is held. Returns true if a link was opened.
	pub fn on_activate(&self, event: &PointerEvent) -> bool {
		match &self.opener {
			Some(opener) if !self.disposed => self.overlay.activate(event, &self.reconciler, opener.as_ref()),
			_ => false,
		}
	}

	/// Handles queued signals and a due fetch without waiting.
	pub fn poll<S: EditorSurface>(&mut self, surface: &mut S) {
		while let Ok(signal) = self.signals_rx.try_recv() {
			self.handle(signal, surface);
		}
		if self.scheduler.take_due(Instant::now()) {
			self.fire(surface);
		}
	}

	/// Waits for the next signal or the debounce deadline and handles it.
	pub async fn step<S: EditorSurface>(&mut self, surface: &mut S) {
		let deadline = self.scheduler.deadline();
		tokio::select! {
			biased;
			Some(signal) = self.signals_rx.recv() => self.handle(signal, surface),
			_ = sleep_until(deadline) => {
				if self.scheduler.take_due(Instant::now()) {
					self.fire(surface);
				}
			}
		}
	}

	/// Steps until nothing is scheduled or fetching.
	pub async fn run_until_idle<S: EditorSurface>(&mut self, surface: &mut S) {
		while matches!(self.state(), ControllerState::Scheduled | ControllerState::Fetching) {
			self.step(surface).await;
		}
	}

	/// Cancels all work, removes owned decorations and releases every style.
	///
	/// Idempotent; the controller is inert afterwards.
	pub fn dispose<S: EditorSurface>(&mut self, surface: &mut S) {
		if std::mem::replace(&mut self.disposed, true) {
			return;
		}
		self.lifetime.cancel();
		self.scheduler.cancel();
		self.cycle = None;
		self.session_doc = None;
		self.overlay.reset();
		match surface.model_mut() {
			Some(model) => self.reconciler.remove_all(model),
			None => self.reconciler.forget_all(),
		}
		tracing::debug!("annotations.dispose");
	}

	fn update<S: EditorSurface>(&mut self, surface: &mut S) {
		if self.disposed {
			return;
		}
		self.session.cancel();
		self.session = self.lifetime.child_token();
		self.session_id += 1;
		self.session_doc = None;
		self.cycle = None;
		self.scheduler.cancel();
		self.overlay.reset();

		let layout = LayoutInfo::resolve(&self.config, &surface.font());
		let Some(model) = surface.model_mut() else {
			self.reconciler.forget_all();
			return;
		};
		self.reconciler.remove_all(model);
		if !self.config.enabled {
			tracing::debug!(doc = %model.key(), "annotations.disabled");
			return;
		}
		let providers = self.registry.ordered(model.language());
		if providers.is_empty() {
			tracing::trace!(doc = %model.key(), language = model.language(), "annotations.no_provider");
			return;
		}

		if let Some(cached) = self.cache.get(&*model) {
			let whole = whole_document(&*model);
			self.reconciler.render(model, &[whole], &cached, &layout, None);
		}

		for entry in &providers {
			if let Some(changes) = entry.provider.changes() {
				let (session, provider) = (self.session_id, entry.id);
				forward_changes(changes, self.session.clone(), self.signals_tx.clone(), move || Signal::ProviderChanged { session, provider });
			}
		}

		let key = model.key().clone();
		self.scheduler.set_delay(self.delays.get(&key));
		self.scheduler.schedule(Instant::now());
		tracing::debug!(doc = %key, providers = providers.len(), delay_ms = self.scheduler.delay().as_millis() as u64, "annotations.session");
		self.session_doc = Some(key);
	}

	fn schedule(&mut self, reason: &'static str) {
		if self.disposed || self.session_doc.is_none() {
			return;
		}
		let replaced = self.scheduler.schedule(Instant::now());
		tracing::trace!(reason, replaced, "annotations.schedule");
	}

	fn handle<S: EditorSurface>(&mut self, signal: Signal, surface: &mut S) {
		if self.disposed {
			return;
		}
		match signal {
			Signal::RegistryChanged => self.update(surface),
			Signal::ProviderChanged { session, provider } => {
				if session != self.session_id {
					return;
				}
				let in_flight = self.session_doc.as_ref().is_some_and(|doc| self.ledger.has(doc, provider));
				if in_flight {
					tracing::trace!(%provider, "annotations.provider_change_suppressed");
					return;
				}
				self.schedule("provider");
			}
			Signal::Settled {
				cycle,
				key,
				report,
				elapsed,
			} => {
				let delay = self.delays.update(&key, elapsed);
				if self.session_doc.as_ref() == Some(&key) {
					self.scheduler.set_delay(delay);
				}
				let Some(current) = self.cycle.take_if(|c| c.id == cycle) else {
					tracing::trace!(cycle, "annotations.superseded");
					return;
				};
				let outcome = self.apply(surface, current, report);
				self.last_outcome = Some(outcome);
			}
		}
	}

	fn fire<S: EditorSurface>(&mut self, surface: &mut S) {
		let Some(key) = self.session_doc.clone() else {
			return;
		};
		let visible = surface.visible_ranges();
		let Some(model) = surface.model() else {
			return;
		};
		if model.key() != &key {
			return;
		}
		let ranges = annotation_ranges(model, &visible, self.config.margin_lines);
		if ranges.is_empty() {
			tracing::trace!(doc = %key, "annotations.nothing_visible");
			return;
		}
		if let Some(previous) = self.cycle.take() {
			previous.cancel.cancel();
		}

		self.next_cycle += 1;
		let id = self.next_cycle;
		let cancel = self.session.child_token();
		let snapshot = model.snapshot();
		tracing::debug!(doc = %key, version = snapshot.version(), cycle = id, ranges = ranges.len(), "annotations.fetch");

		let registry = Arc::clone(&self.registry);
		let ledger = self.ledger.clone();
		let tx = self.signals_tx.clone();
		let task_ranges = ranges.clone();
		let task_cancel = cancel.clone();
		let task_key = key.clone();
		tokio::spawn(async move {
			let started = Instant::now();
			let report = fetch_annotations(&registry, &snapshot, &task_ranges, &ledger, &task_cancel).await;
			let _ = tx.send(Signal::Settled {
				cycle: id,
				key: task_key,
				report,
				elapsed: started.elapsed(),
			});
		});

		self.cycle = Some(Cycle {
			id,
			key,
			version: model.version(),
			ranges,
			cancel,
		});
	}

	fn apply<S: EditorSurface>(&mut self, surface: &mut S, cycle: Cycle, report: Option<FetchReport>) -> CycleOutcome {
		let Some(report) = report.filter(|_| !cycle.cancel.is_cancelled()) else {
			tracing::trace!(cycle = cycle.id, "annotations.cancelled");
			return CycleOutcome::Cancelled;
		};
		let layout = LayoutInfo::resolve(&self.config, &surface.font());
		let Some(model) = surface.model_mut() else {
			return CycleOutcome::Cancelled;
		};
		if model.key() != &cycle.key || model.version() != cycle.version {
			tracing::debug!(doc = %cycle.key, version = cycle.version, current = model.version(), "annotations.stale");
			return CycleOutcome::Cancelled;
		}
		if report.all_failed() {
			tracing::debug!(doc = %cycle.key, failures = report.failures, "annotations.failed");
			return CycleOutcome::Failed;
		}

		self.overlay.reset();
		let added = self.reconciler.render(model, &cycle.ranges, &report.annotations, &layout, None);
		self.cache.set(&*model, self.reconciler.distinct_annotations());
		tracing::debug!(doc = %cycle.key, version = cycle.version, annotations = report.annotations.len(), decorations = added, "annotations.applied");
		CycleOutcome::Applied
	}
}

impl Drop for AnnotationController {
	fn drop(&mut self) {
		self.lifetime.cancel();
	}
}

//! Common providers and fixtures for annotation integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vista_annotate::memory::{MemoryDocument, MemorySurface};
use vista_annotate::{Annotation, AnnotationKind, AnnotationProvider, LinkOpener, ProviderError};
use vista_primitives::{DocumentSnapshot, Position, Range};

/// Installs a fmt subscriber once per test binary.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// A provider that answers from a script and records every call.
pub struct ScriptedProvider {
	answer: Mutex<Vec<Annotation>>,
	latency: Duration,
	fail: AtomicBool,
	notify_during_fetch: AtomicBool,
	changes: vista_annotate::ChangeSignal,
	calls: AtomicUsize,
	call_log: Mutex<Vec<(Instant, u64, Range)>>,
}

impl ScriptedProvider {
	pub fn new(answer: Vec<Annotation>) -> Arc<Self> {
		Self::with_latency(answer, Duration::ZERO)
	}

	pub fn with_latency(answer: Vec<Annotation>, latency: Duration) -> Arc<Self> {
		Arc::new(Self {
			answer: Mutex::new(answer),
			latency,
			fail: AtomicBool::new(false),
			notify_during_fetch: AtomicBool::new(false),
			changes: vista_annotate::ChangeSignal::new(),
			calls: AtomicUsize::new(0),
			call_log: Mutex::new(Vec::new()),
		})
	}

	pub fn set_answer(&self, answer: Vec<Annotation>) {
		*self.answer.lock() = answer;
	}

	pub fn set_failing(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	pub fn set_notify_during_fetch(&self, notify: bool) {
		self.notify_during_fetch.store(notify, Ordering::SeqCst);
	}

	/// Fires this provider's change signal.
	pub fn notify(&self) {
		self.changes.notify();
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// (time, document version, range) of every call, in call order.
	pub fn call_log(&self) -> Vec<(Instant, u64, Range)> {
		self.call_log.lock().clone()
	}
}

#[async_trait]
impl AnnotationProvider for ScriptedProvider {
	fn name(&self) -> &str {
		"scripted"
	}

	async fn provide_annotations(
		&self,
		doc: &DocumentSnapshot,
		range: Range,
		_cancel: &CancellationToken,
	) -> Result<Option<Vec<Annotation>>, ProviderError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.call_log.lock().push((Instant::now(), doc.version(), range));
		if self.notify_during_fetch.load(Ordering::SeqCst) {
			self.changes.notify();
		}
		if !self.latency.is_zero() {
			tokio::time::sleep(self.latency).await;
		}
		if self.fail.load(Ordering::SeqCst) {
			return Err(ProviderError::failed("scripted failure"));
		}
		Ok(Some(self.answer.lock().clone()))
	}

	fn changes(&self) -> Option<watch::Receiver<u64>> {
		Some(self.changes.subscribe())
	}
}

/// Records opened links.
#[derive(Default)]
pub struct RecordingOpener {
	opened: Mutex<Vec<(String, bool)>>,
}

impl RecordingOpener {
	pub fn opened(&self) -> Vec<(String, bool)> {
		self.opened.lock().clone()
	}
}

impl LinkOpener for RecordingOpener {
	fn open(&self, target: &str, open_to_side: bool) {
		self.opened.lock().push((target.to_string(), open_to_side));
	}
}

/// A rust document of `lines` lines of `let value = compute(a, b);`.
pub fn document(lines: usize) -> MemoryDocument {
	let text: String = (0..lines).map(|_| "let value = compute(a, b);\n").collect();
	MemoryDocument::new("mem://main.rs", "rust", &text)
}

/// A surface over [`document`] showing its first 20 lines.
pub fn surface(lines: usize) -> MemorySurface {
	MemorySurface::new(document(lines), vec![Range::new(0, 0, 20, 0)])
}

/// A type hint right after `value` on `line`.
pub fn type_hint(line: u32, text: &str) -> Annotation {
	Annotation::new(Position::new(line, 9), text, AnnotationKind::Type)
}

//! Annotation sources and the ordered registry they live in.
//!
//! Providers are opaque: the engine only calls them through
//! [`AnnotationProvider`] (or [`RangeTokensProvider`] for semantic tokens)
//! and never inspects how they compute their answers. A
//! [`ProviderRegistry`] is an explicit object handed to each controller; its
//! revision channel replaces a global "registry changed" event.
//!
//! [`RangeTokensProvider`]: crate::semantic::RangeTokensProvider

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use vista_primitives::{DocumentSnapshot, Range};

use crate::annotation::Annotation;
use crate::error::ProviderError;

/// Registry-assigned provider identity, unique per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderId(u32);

impl fmt::Display for ProviderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "provider#{}", self.0)
	}
}

/// Which documents a provider applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSelector {
	/// Every document.
	All,
	/// Documents with this language identifier.
	Language(String),
}

impl DocumentSelector {
	/// Returns true if a document with `language` is selected.
	pub fn matches(&self, language: &str) -> bool {
		match self {
			Self::All => true,
			Self::Language(lang) => lang == language,
		}
	}
}

/// A source of position-anchored annotations.
#[async_trait]
pub trait AnnotationProvider: Send + Sync {
	/// Name used in logs.
	fn name(&self) -> &str {
		"annotations"
	}

	/// Computes annotations for `range` of `doc`.
	///
	/// Providers may return annotations outside `range`; the engine filters
	/// them. `Ok(None)` and `Ok(Some(vec![]))` both mean "nothing here".
	/// `cancel` is advisory: results from a cancelled request are discarded.
	async fn provide_annotations(
		&self,
		doc: &DocumentSnapshot,
		range: Range,
		cancel: &CancellationToken,
	) -> Result<Option<Vec<Annotation>>, ProviderError>;

	/// Optional notification fired when this provider's answers may have
	/// changed.
	fn changes(&self) -> Option<watch::Receiver<u64>> {
		None
	}
}

/// Change notification source for providers.
///
/// Notifying without subscribers is fine; late subscribers only see
/// notifications sent after they subscribed.
#[derive(Debug)]
pub struct ChangeSignal {
	tx: watch::Sender<u64>,
}

impl Default for ChangeSignal {
	fn default() -> Self {
		Self::new()
	}
}

impl ChangeSignal {
	/// Creates a signal at revision zero.
	pub fn new() -> Self {
		let (tx, _) = watch::channel(0);
		Self { tx }
	}

	/// Bumps the revision and wakes subscribers.
	pub fn notify(&self) {
		self.tx.send_modify(|rev| *rev = rev.wrapping_add(1));
	}

	/// Returns a receiver that observes future notifications.
	pub fn subscribe(&self) -> watch::Receiver<u64> {
		self.tx.subscribe()
	}

	/// Current revision.
	pub fn revision(&self) -> u64 {
		*self.tx.borrow()
	}
}

/// A provider together with its registry identity.
pub struct RegisteredProvider<P: ?Sized> {
	/// Registry identity.
	pub id: ProviderId,
	/// The provider.
	pub provider: Arc<P>,
}

impl<P: ?Sized> Clone for RegisteredProvider<P> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			provider: Arc::clone(&self.provider),
		}
	}
}

impl<P: ?Sized> fmt::Debug for RegisteredProvider<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegisteredProvider").field("id", &self.id).finish_non_exhaustive()
	}
}

struct Entry<P: ?Sized> {
	id: ProviderId,
	selector: DocumentSelector,
	provider: Arc<P>,
}

struct RegistryState<P: ?Sized> {
	entries: Vec<Entry<P>>,
	next_id: u32,
}

/// Ordered registry of providers.
///
/// Entries are kept in registration order. Every registration and removal
/// bumps the registry revision, observable through [`subscribe`].
///
/// [`subscribe`]: ProviderRegistry::subscribe
pub struct ProviderRegistry<P: ?Sized> {
	state: RwLock<RegistryState<P>>,
	revision: ChangeSignal,
}

impl<P: ?Sized> Default for ProviderRegistry<P> {
	fn default() -> Self {
		Self {
			state: RwLock::new(RegistryState {
				entries: Vec::new(),
				next_id: 0,
			}),
			revision: ChangeSignal::new(),
		}
	}
}

impl<P: ?Sized> fmt::Debug for ProviderRegistry<P> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderRegistry")
			.field("len", &self.len())
			.field("revision", &self.revision.revision())
			.finish()
	}
}

impl<P: ?Sized> ProviderRegistry<P> {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a provider for documents matching `selector`.
	pub fn register(&self, selector: DocumentSelector, provider: Arc<P>) -> ProviderId {
		let id = {
			let mut state = self.state.write();
			let id = ProviderId(state.next_id);
			state.next_id += 1;
			state.entries.push(Entry { id, selector, provider });
			id
		};
		tracing::debug!(provider = %id, "provider.register");
		self.revision.notify();
		id
	}

	/// Removes a provider. Returns false if it was not registered.
	pub fn unregister(&self, id: ProviderId) -> bool {
		let removed = {
			let mut state = self.state.write();
			let before = state.entries.len();
			state.entries.retain(|e| e.id != id);
			state.entries.len() != before
		};
		if removed {
			tracing::debug!(provider = %id, "provider.unregister");
			self.revision.notify();
		}
		removed
	}

	/// Providers applying to `language`, in registration order.
	pub fn ordered(&self, language: &str) -> Vec<RegisteredProvider<P>> {
		self.state
			.read()
			.entries
			.iter()
			.filter(|e| e.selector.matches(language))
			.map(|e| RegisteredProvider {
				id: e.id,
				provider: Arc::clone(&e.provider),
			})
			.collect()
	}

	/// Returns true if any provider applies to `language`.
	pub fn has(&self, language: &str) -> bool {
		self.state.read().entries.iter().any(|e| e.selector.matches(language))
	}

	/// Number of registered providers.
	pub fn len(&self) -> usize {
		self.state.read().entries.len()
	}

	/// Returns true if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Receiver notified on every registration change.
	pub fn subscribe(&self) -> watch::Receiver<u64> {
		self.revision.subscribe()
	}
}

/// Forwards every change on `changes` into `tx` as `signal()` until `stop`
/// fires or either channel closes.
pub(crate) fn forward_changes<T>(
	mut changes: watch::Receiver<u64>,
	stop: CancellationToken,
	tx: mpsc::UnboundedSender<T>,
	signal: impl Fn() -> T + Send + 'static,
) where
	T: Send + 'static,
{
	changes.mark_unchanged();
	tokio::spawn(async move {
		loop {
			tokio::select! {
				biased;
				_ = stop.cancelled() => return,
				changed = changes.changed() => {
					if changed.is_err() || tx.send(signal()).is_err() {
						return;
					}
				}
			}
		}
	});
}

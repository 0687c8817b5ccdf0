//! In-flight request bookkeeping per (document, provider).
//!
//! The controller consults the ledger when a provider signals a change: if
//! that provider already has a request running for the document, the
//! running request will pick the change up and no new fetch is scheduled.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vista_primitives::DocumentKey;

use crate::provider::ProviderId;

/// Shared record of outstanding provider requests.
///
/// Cloning yields another handle to the same ledger. A provider may have
/// several concurrent requests for one document (one per range); the pair
/// is reported as in flight until the last of them settles.
#[derive(Debug, Clone, Default)]
pub struct RequestLedger {
	inner: Arc<Mutex<HashMap<DocumentKey, HashMap<ProviderId, usize>>>>,
}

impl RequestLedger {
	/// Creates an empty ledger.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records an outstanding request.
	pub fn push(&self, doc: &DocumentKey, provider: ProviderId) {
		*self.inner.lock().entry(doc.clone()).or_default().entry(provider).or_insert(0) += 1;
	}

	/// Records that a request settled.
	///
	/// Drops the document entry once no provider has anything in flight.
	pub fn pop(&self, doc: &DocumentKey, provider: ProviderId) {
		let mut inner = self.inner.lock();
		let Some(providers) = inner.get_mut(doc) else {
			return;
		};
		if let Some(count) = providers.get_mut(&provider) {
			*count -= 1;
			if *count == 0 {
				providers.remove(&provider);
			}
		}
		if providers.is_empty() {
			inner.remove(doc);
		}
	}

	/// Returns true if `provider` has a request in flight for `doc`.
	pub fn has(&self, doc: &DocumentKey, provider: ProviderId) -> bool {
		self.inner.lock().get(doc).is_some_and(|p| p.contains_key(&provider))
	}

	/// Number of documents with anything in flight.
	pub fn document_count(&self) -> usize {
		self.inner.lock().len()
	}

	/// Marks a request and returns a guard that unmarks it on drop.
	///
	/// The guard runs on success, failure, panic unwinding and when the
	/// request future is dropped mid-flight.
	pub fn enter(&self, doc: &DocumentKey, provider: ProviderId) -> LedgerGuard {
		self.push(doc, provider);
		LedgerGuard {
			ledger: self.clone(),
			doc: doc.clone(),
			provider,
		}
	}
}

/// Unmarks a request when dropped.
#[must_use = "the request is unmarked as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LedgerGuard {
	ledger: RequestLedger,
	doc: DocumentKey,
	provider: ProviderId,
}

impl Drop for LedgerGuard {
	fn drop(&mut self) {
		self.ledger.pop(&self.doc, self.provider);
	}
}

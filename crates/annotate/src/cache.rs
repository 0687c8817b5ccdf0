//! Last merged annotation set per (document, version).
//!
//! Used for an immediate, synchronous render when a document becomes
//! visible again while a fresh fetch runs in the background. Entries are
//! never invalidated explicitly: a version bump makes the old key
//! unreachable and it ages out of the LRU.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use vista_primitives::DocumentKey;

use crate::annotation::Annotation;
use crate::config::DEFAULT_CACHE_CAPACITY;
use crate::model::TextModel;

type CacheKey = (DocumentKey, u64);

/// Bounded LRU of merged annotation sets.
#[derive(Debug)]
pub struct ResultCache {
	entries: LruCache<CacheKey, Arc<[Annotation]>>,
}

impl Default for ResultCache {
	fn default() -> Self {
		Self::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
	}
}

impl ResultCache {
	/// Creates a cache holding at most `capacity` entries.
	pub fn new(capacity: NonZeroUsize) -> Self {
		Self {
			entries: LruCache::new(capacity),
		}
	}

	/// Returns the set stored for the model's current version.
	pub fn get<M: TextModel + ?Sized>(&mut self, model: &M) -> Option<Arc<[Annotation]>> {
		self.get_version(model.key(), model.version())
	}

	/// Returns the set stored for `key` at `version`.
	pub fn get_version(&mut self, key: &DocumentKey, version: u64) -> Option<Arc<[Annotation]>> {
		self.entries.get(&(key.clone(), version)).cloned()
	}

	/// Stores `annotations` under the model's current version.
	pub fn set<M: TextModel + ?Sized>(&mut self, model: &M, annotations: impl Into<Arc<[Annotation]>>) {
		self.set_version(model.key().clone(), model.version(), annotations);
	}

	/// Stores `annotations` under `key` at `version`, evicting the least
	/// recently used entry when full.
	pub fn set_version(&mut self, key: DocumentKey, version: u64, annotations: impl Into<Arc<[Annotation]>>) {
		if let Some(((old_key, old_version), _)) = self.entries.push((key, version), annotations.into()) {
			tracing::trace!(doc = %old_key, version = old_version, "annotation cache displaced entry");
		}
	}

	/// Changes the capacity, evicting least recently used entries if needed.
	pub fn resize(&mut self, capacity: NonZeroUsize) {
		self.entries.resize(capacity);
	}

	/// Number of cached entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

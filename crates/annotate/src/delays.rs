//! Adaptive fetch delays.
//!
//! Each document keeps a running average of observed fetch latency. The
//! debounce delay is that average clamped to `[min, max]`: fast providers
//! get near-immediate refreshes, slow ones are not hammered while the user
//! types.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use vista_primitives::DocumentKey;

use crate::config::DEFAULT_CACHE_CAPACITY;

/// Cumulative moving average.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovingAverage {
	value: f64,
	samples: u32,
}

impl MovingAverage {
	/// Folds one sample into the average and returns the new value.
	pub fn update(&mut self, sample: f64) -> f64 {
		self.samples += 1;
		self.value += (sample - self.value) / f64::from(self.samples);
		self.value
	}

	/// Current average; zero before any sample.
	pub fn value(&self) -> f64 {
		self.value
	}
}

/// Per-document adaptive delays bounded by `[min, max]`.
#[derive(Debug)]
pub struct RequestDelays {
	averages: LruCache<DocumentKey, MovingAverage>,
	min: Duration,
	max: Duration,
}

impl RequestDelays {
	/// Creates a delay table with the given bounds.
	pub fn new(min: Duration, max: Duration) -> Self {
		Self {
			averages: LruCache::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
			min,
			max: max.max(min),
		}
	}

	/// Current delay for `doc`; the lower bound before any observation.
	pub fn get(&mut self, doc: &DocumentKey) -> Duration {
		let avg = self.averages.get(doc).map_or(0.0, MovingAverage::value);
		self.clamp(avg)
	}

	/// Records an observed latency and returns the updated delay.
	pub fn update(&mut self, doc: &DocumentKey, elapsed: Duration) -> Duration {
		let sample = elapsed.as_secs_f64() * 1000.0;
		let avg = self.averages.get_or_insert_mut(doc.clone(), MovingAverage::default).update(sample);
		self.clamp(avg)
	}

	fn clamp(&self, millis: f64) -> Duration {
		Duration::from_millis(millis.max(0.0).round() as u64).clamp(self.min, self.max)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn delays() -> RequestDelays {
		RequestDelays::new(Duration::from_millis(25), Duration::from_millis(500))
	}

	#[test]
	fn test_unknown_document_uses_lower_bound() {
		let mut delays = delays();
		assert_eq!(delays.get(&DocumentKey::new("mem://a")), Duration::from_millis(25));
	}

	#[test]
	fn test_delay_tracks_average_within_bounds() {
		let mut delays = delays();
		let doc = DocumentKey::new("mem://a");
		assert_eq!(delays.update(&doc, Duration::from_millis(100)), Duration::from_millis(100));
		assert_eq!(delays.update(&doc, Duration::from_millis(200)), Duration::from_millis(150));
		assert_eq!(delays.get(&doc), Duration::from_millis(150));
	}

	#[test]
	fn test_slow_provider_caps_at_upper_bound() {
		let mut delays = delays();
		let doc = DocumentKey::new("mem://slow");
		assert_eq!(delays.update(&doc, Duration::from_secs(4)), Duration::from_millis(500));
	}

	#[test]
	fn test_fast_provider_floors_at_lower_bound() {
		let mut delays = delays();
		let doc = DocumentKey::new("mem://fast");
		assert_eq!(delays.update(&doc, Duration::from_millis(2)), Duration::from_millis(25));
	}

	#[test]
	fn test_documents_are_independent() {
		let mut delays = delays();
		let a = DocumentKey::new("mem://a");
		delays.update(&a, Duration::from_millis(300));
		assert_eq!(delays.get(&DocumentKey::new("mem://b")), Duration::from_millis(25));
	}

	#[test]
	fn test_moving_average() {
		let mut avg = MovingAverage::default();
		avg.update(10.0);
		avg.update(20.0);
		avg.update(30.0);
		assert!((avg.value() - 20.0).abs() < f64::EPSILON);
	}
}

//! Single-pending debounce scheduler.
//!
//! Bursts of invalidation triggers collapse into one pending firing. Each
//! [`schedule`] pushes the deadline to `now + delay`; the owner polls
//! [`take_due`] from its event loop (or sleeps until [`deadline`]).
//!
//! [`schedule`]: DebounceScheduler::schedule
//! [`take_due`]: DebounceScheduler::take_due
//! [`deadline`]: DebounceScheduler::deadline

use std::time::Duration;

use tokio::time::Instant;

/// Debounced run-once scheduler with at most one pending firing.
#[derive(Debug, Clone)]
pub struct DebounceScheduler {
	delay: Duration,
	deadline: Option<Instant>,
}

impl DebounceScheduler {
	/// Creates an idle scheduler.
	pub fn new(delay: Duration) -> Self {
		Self { delay, deadline: None }
	}

	/// Delay applied by the next [`schedule`](Self::schedule).
	pub fn delay(&self) -> Duration {
		self.delay
	}

	/// Changes the delay. An already pending deadline is left as is.
	pub fn set_delay(&mut self, delay: Duration) {
		self.delay = delay;
	}

	/// Arms (or re-arms) the scheduler to fire `delay` after `now`.
	///
	/// Returns true if a pending firing was replaced.
	pub fn schedule(&mut self, now: Instant) -> bool {
		self.deadline.replace(now + self.delay).is_some()
	}

	/// Drops the pending firing. Returns true if one was pending.
	pub fn cancel(&mut self) -> bool {
		self.deadline.take().is_some()
	}

	/// Returns true if a firing is pending.
	pub fn is_scheduled(&self) -> bool {
		self.deadline.is_some()
	}

	/// When the pending firing is due.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Consumes the pending firing if it is due at `now`.
	pub fn take_due(&mut self, now: Instant) -> bool {
		match self.deadline {
			Some(deadline) if deadline <= now => {
				self.deadline = None;
				true
			}
			_ => false,
		}
	}
}

/// Sleeps until `deadline`, or forever when nothing is pending.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

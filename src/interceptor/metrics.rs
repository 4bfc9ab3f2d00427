// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Something that happened while an interceptor recovered from a 401.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RefreshEvent {
	Attempt,
	Success,
	Failure,
	Coalesced,
}

/// Per-interceptor counters for 401-triggered refreshes.
#[derive(Debug, Default)]
pub struct RefreshMetrics([AtomicU64; 4]);
impl RefreshMetrics {
	/// Refreshes this interceptor started.
	pub fn attempts(&self) -> u64 {
		self.get(RefreshEvent::Attempt)
	}

	/// Refreshes that produced a new token.
	pub fn successes(&self) -> u64 {
		self.get(RefreshEvent::Success)
	}

	/// Refreshes that failed or timed out.
	pub fn failures(&self) -> u64 {
		self.get(RefreshEvent::Failure)
	}

	/// 401s resolved by joining a refresh another request performed.
	pub fn coalesced(&self) -> u64 {
		self.get(RefreshEvent::Coalesced)
	}

	pub(crate) fn record(&self, event: RefreshEvent) {
		self.0[event as usize].fetch_add(1, Ordering::Relaxed);
	}

	fn get(&self, event: RefreshEvent) -> u64 {
		self.0[event as usize].load(Ordering::Relaxed)
	}
}

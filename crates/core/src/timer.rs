//! Inactivity timers for non-interactive sessions.
//!
//! Each session gets at most one timer. A timer is a spawned task racing its
//! deadline against a [`CancellationToken`] shared with the session record:
//! cancelling the token (explicit delete, shutdown) disarms it, and a fired
//! timer removes its own entry before running the expiry callback. Entries
//! live in a [`DashMap`] so arming or cancelling one session never blocks
//! another.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct TimerEntry {
	generation: u64,
	deadline: Instant,
	token: CancellationToken,
}

/// Owns one cancellable expiry timer per session id.
#[derive(Default)]
pub struct InactivityTimers {
	timers: Arc<DashMap<String, TimerEntry>>,
	next_generation: AtomicU64,
}

impl InactivityTimers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Arms a timer that runs `on_expire` after `timeout` unless `token` is
	/// cancelled first.
	///
	/// Re-arming is not supported: returns `false` and leaves the existing
	/// timer untouched if one is already armed for `session_id`.
	pub fn arm<F, Fut>(&self, session_id: &str, token: CancellationToken, timeout: Duration, on_expire: F) -> bool
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let slot = match self.timers.entry(session_id.to_string()) {
			Entry::Occupied(_) => {
				debug!(target: "wdproxy.timer", session = session_id, "timer already armed; ignoring");
				return false;
			}
			Entry::Vacant(slot) => slot,
		};

		let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
		let deadline = Instant::now() + timeout;
		slot.insert(TimerEntry {
			generation,
			deadline,
			token: token.clone(),
		});

		let timers = Arc::clone(&self.timers);
		let session_id = session_id.to_string();
		trace!(target: "wdproxy.timer", session = %session_id, timeout_secs = timeout.as_secs(), "timer armed");
		tokio::spawn(async move {
			tokio::select! {
				biased;
				_ = token.cancelled() => {
					trace!(target: "wdproxy.timer", session = %session_id, "timer cancelled");
				}
				_ = tokio::time::sleep_until(deadline) => {
					timers.remove_if(&session_id, |_, entry| entry.generation == generation);
					debug!(target: "wdproxy.timer", session = %session_id, "timer fired");
					on_expire().await;
				}
			}
		});
		true
	}

	/// Disarms and forgets the timer for `session_id`. Returns whether one was armed.
	pub fn cancel(&self, session_id: &str) -> bool {
		match self.timers.remove(session_id) {
			Some((_, entry)) => {
				entry.token.cancel();
				true
			}
			None => false,
		}
	}

	/// Disarms every timer.
	pub fn cancel_all(&self) {
		let ids: Vec<String> = self.timers.iter().map(|e| e.key().clone()).collect();
		for id in ids {
			self.cancel(&id);
		}
	}

	pub fn is_armed(&self, session_id: &str) -> bool {
		self.timers.contains_key(session_id)
	}

	pub fn deadline(&self, session_id: &str) -> Option<Instant> {
		self.timers.get(session_id).map(|e| e.deadline)
	}

	pub fn len(&self) -> usize {
		self.timers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.timers.is_empty()
	}
}

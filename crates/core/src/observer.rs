//! Session observer collaborator.
//!
//! Observers (dashboards watching live browsers) are notified fire-and-forget;
//! delivery is the implementor's concern and must not block the caller.

use crate::record::SessionRecord;

pub trait SessionObserver: Send + Sync {
	/// A non-interactive session finished its create handshake.
	fn session_created(&self, record: &SessionRecord);

	/// A non-interactive session was torn down.
	fn session_removed(&self, record: &SessionRecord);

	/// Recording artifacts for the session are available.
	fn recording_ready(&self, record: &SessionRecord);

	/// Whether anyone is listening. Creation events are skipped when not.
	fn has_active_observers(&self) -> bool;
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObservers;

impl SessionObserver for NoObservers {
	fn session_created(&self, _record: &SessionRecord) {}

	fn session_removed(&self, _record: &SessionRecord) {}

	fn recording_ready(&self, _record: &SessionRecord) {}

	fn has_active_observers(&self) -> bool {
		false
	}
}

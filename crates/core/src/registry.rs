//! Concurrent session registry.
//!
//! Backed by [`DashMap`], which shards its lock by key: operations on
//! different sessions never contend. [`SessionRegistry::remove`] is the
//! single gate for teardown. Only the caller that actually removes a record
//! proceeds with destructive cleanup.

use std::sync::Arc;

use dashmap::DashMap;

use crate::record::SessionRecord;

/// Live sessions keyed by hub-assigned session id.
#[derive(Default)]
pub struct SessionRegistry {
	sessions: DashMap<String, Arc<SessionRecord>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a session. Returns the previous record under the same id,
	/// which only a misbehaving hub could produce.
	pub fn insert(&self, record: Arc<SessionRecord>) -> Option<Arc<SessionRecord>> {
		self.sessions.insert(record.session_id.clone(), record)
	}

	pub fn get(&self, session_id: &str) -> Option<Arc<SessionRecord>> {
		self.sessions.get(session_id).map(|r| Arc::clone(r.value()))
	}

	/// Removes and returns the record. Removing an absent id is a no-op.
	pub fn remove(&self, session_id: &str) -> Option<Arc<SessionRecord>> {
		self.sessions.remove(session_id).map(|(_, record)| record)
	}

	pub fn contains(&self, session_id: &str) -> bool {
		self.sessions.contains_key(session_id)
	}

	/// Point-in-time copy of every live session.
	pub fn snapshot(&self) -> Vec<Arc<SessionRecord>> {
		self.sessions.iter().map(|r| Arc::clone(r.value())).collect()
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}
}

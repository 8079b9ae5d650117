//! Recording collaborator.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::SessionRecord;

/// Captures the visual stream of a session.
#[async_trait]
pub trait Recorder: Send + Sync {
	async fn start(&self, record: &SessionRecord) -> Result<()>;

	async fn stop(&self, record: &SessionRecord) -> Result<()>;

	/// Stores the metadata describing a finished recording.
	async fn persist_metadata(&self, record: &SessionRecord) -> Result<()>;
}

/// Recorder that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecorder;

#[async_trait]
impl Recorder for NoRecorder {
	async fn start(&self, _record: &SessionRecord) -> Result<()> {
		Ok(())
	}

	async fn stop(&self, _record: &SessionRecord) -> Result<()> {
		Ok(())
	}

	async fn persist_metadata(&self, _record: &SessionRecord) -> Result<()> {
		Ok(())
	}
}

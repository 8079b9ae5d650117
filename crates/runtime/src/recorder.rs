//! Recorder driving the capture scripts shipped inside browser images.
//!
//! Video files land in the container's recording folder, which the
//! provisioner binds onto the host registry folder. Metadata for each
//! finished recording is written next to them as `<session id>.eus`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wdproxy::{Recorder, SessionRecord};
use wdproxy_protocol::SessionEntry;

use crate::docker::DockerCli;

const START_SCRIPT: &str = "start-video-recording.sh";
const STOP_SCRIPT: &str = "stop-video-recording.sh";
const METADATA_EXTENSION: &str = "eus";
const VIDEO_EXTENSION: &str = "mp4";

/// Contents of a `<session id>.eus` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
	#[serde(flatten)]
	pub entry: SessionEntry,
	/// Video file name, relative to the registry folder.
	pub recording: String,
}

/// Starts and stops capture with `docker exec`.
pub struct ContainerRecorder {
	docker: Arc<DockerCli>,
	registry_folder: PathBuf,
}

impl ContainerRecorder {
	pub fn new(docker: Arc<DockerCli>, registry_folder: impl Into<PathBuf>) -> Self {
		Self {
			docker,
			registry_folder: registry_folder.into(),
		}
	}

	pub fn registry_folder(&self) -> &Path {
		&self.registry_folder
	}

	/// Path of the metadata file for `session_id`.
	pub fn metadata_path(&self, session_id: &str) -> PathBuf {
		self.registry_folder
			.join(format!("{session_id}.{METADATA_EXTENSION}"))
	}
}

#[async_trait]
impl Recorder for ContainerRecorder {
	async fn start(&self, record: &SessionRecord) -> wdproxy::Result<()> {
		debug!(target: "wdproxy.docker", session = %record.session_id, "starting recording");
		self.docker
			.exec(record.hub_container(), true, &[START_SCRIPT, "-n", &record.session_id])
			.await?;
		Ok(())
	}

	async fn stop(&self, record: &SessionRecord) -> wdproxy::Result<()> {
		debug!(target: "wdproxy.docker", session = %record.session_id, "stopping recording");
		self.docker.exec(record.hub_container(), false, &[STOP_SCRIPT]).await?;
		Ok(())
	}

	async fn persist_metadata(&self, record: &SessionRecord) -> wdproxy::Result<()> {
		let metadata = RecordingMetadata {
			entry: record.entry(),
			recording: format!("{}.{VIDEO_EXTENSION}", record.session_id),
		};
		let path = self.metadata_path(&record.session_id);
		tokio::fs::create_dir_all(&self.registry_folder).await?;
		tokio::fs::write(&path, serde_json::to_vec_pretty(&metadata)?).await?;
		info!(target: "wdproxy.docker", session = %record.session_id, path = %path.display(), "recording metadata stored");
		Ok(())
	}
}

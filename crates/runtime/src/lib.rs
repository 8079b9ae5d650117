//! wdproxy-runtime - Docker-backed collaborators for the session engine
//!
//! - [`DockerCli`]: [`wdproxy::ContainerRuntime`] over the `docker` client
//!   (start, stop, port allocation, reachability polling)
//! - [`ContainerRecorder`]: [`wdproxy::Recorder`] running the capture scripts
//!   inside browser images and storing `.eus` metadata on the host

pub mod docker;
pub mod error;
pub mod recorder;

pub use docker::{DockerCli, run_args};
pub use error::{Error, Result};
pub use recorder::{ContainerRecorder, RecordingMetadata};

//! wdproxy - on-demand browser sessions behind a WebDriver endpoint
//!
//! The engine intercepts WebDriver session-lifecycle requests, provisions a
//! fresh browser container per session, and relays every other command to
//! the container's own hub:
//!
//! - **Capabilities**: legacy and W3C payload parsing, policy rewrites
//! - **Provisioning**: image resolution, container start, reachability waits
//! - **Exchange**: relaying to a hub, redirect normalization, retry signalling
//! - **Sessions**: registry, inactivity timers, idempotent teardown
//!
//! # Architecture
//!
//! ```text
//!  client ──► Orchestrator ──► Exchange ──► browser hub (container)
//!                 │
//!                 ├── Capabilities / CapabilityRewriter
//!                 ├── Provisioner ──► dyn ContainerRuntime
//!                 ├── SessionRegistry + InactivityTimers
//!                 └── dyn SessionObserver, dyn Recorder
//! ```
//!
//! Container lifecycle, recording and observer delivery are collaborators
//! behind traits; `wdproxy-runtime` and the `wdproxy` binary provide the
//! concrete ones.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod exchange;
pub mod observer;
pub mod orchestrator;
pub mod provision;
pub mod record;
pub mod recording;
pub mod registry;
pub mod rewrite;
pub mod route;
pub mod timer;

pub use capabilities::Capabilities;
pub use config::{Config, ProvisionConfig};
pub use error::{Error, Result};
pub use exchange::{Exchange, ProxyRequest, ProxyResponse};
pub use observer::{NoObservers, SessionObserver};
pub use orchestrator::{HUB_CONTAINER_KEY, Orchestrator, Trigger, inject_container};
pub use provision::{Bind, ContainerRuntime, ContainerSpec, PortBinding, Provisioner};
pub use record::{Containers, Environment, SessionRecord};
pub use recording::{NoRecorder, Recorder};
pub use registry::SessionRegistry;
pub use rewrite::{CapabilityRewriter, Condition, Edit, RewritePipeline, RewriteRule};
pub use route::{Route, classify, session_id_from_path};
pub use timer::InactivityTimers;

pub use reqwest::{Method, StatusCode};

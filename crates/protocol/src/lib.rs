//! Wire types for the WebDriver session proxy.
//!
//! This crate holds the serde shapes that cross a process boundary:
//! capability payloads sent by WebDriver clients, create-session responses
//! returned by browser hubs, events pushed to session observers, and the
//! status/error bodies the proxy itself emits.
//!
//! Types here are pure data. Parsing policy (which shape wins, how missing
//! fields are treated) lives in the engine crate.

pub mod capabilities;
pub mod events;
pub mod session;
pub mod status;

pub use capabilities::*;
pub use events::*;
pub use session::*;
pub use status::*;

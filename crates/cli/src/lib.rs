//! wdproxy server: HTTP front end, observer WebSocket, configuration and
//! logging around the [`wdproxy`] session engine.

pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod logging;
pub mod server;

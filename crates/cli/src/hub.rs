//! WebSocket fan-out of session events to observers (live dashboards).
//!
//! Each socket gets an unbounded channel drained by its own send task, so a
//! broadcast never waits on a slow client. Senders whose socket went away
//! are dropped on the next broadcast.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use wdproxy::{SessionObserver, SessionRecord};
use wdproxy_protocol::ObserverEvent;

#[derive(Default)]
pub struct ObserverHub {
	clients: DashMap<u64, mpsc::UnboundedSender<Message>>,
	next_id: AtomicU64,
}

impl ObserverHub {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn client_count(&self) -> usize {
		self.clients.len()
	}

	/// Registers a client and returns its id and message stream.
	pub fn subscribe(&self) -> (u64, mpsc::UnboundedReceiver<Message>) {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = mpsc::unbounded_channel();
		self.clients.insert(id, tx);
		(id, rx)
	}

	pub fn unsubscribe(&self, id: u64) {
		self.clients.remove(&id);
	}

	/// Sends `event` to every connected client.
	pub fn broadcast(&self, event: &ObserverEvent) {
		let text = match serde_json::to_string(event) {
			Ok(text) => text,
			Err(err) => {
				warn!(target: "wdproxy.hub", error = %err, "failed to encode observer event");
				return;
			}
		};
		debug!(target: "wdproxy.hub", clients = self.clients.len(), event = %text, "broadcasting");
		self.clients
			.retain(|_, tx| tx.send(Message::Text(text.clone().into())).is_ok());
	}

	/// Drops every client sender; their sockets close once drained.
	pub fn close_all(&self) {
		self.clients.clear();
	}

	/// Serves one upgraded socket until the client leaves.
	pub async fn serve_socket(&self, socket: WebSocket) {
		let (id, rx) = self.subscribe();
		info!(target: "wdproxy.hub", client = id, "observer connected");

		let mut rx_stream = UnboundedReceiverStream::new(rx);
		let (mut ws_tx, mut ws_rx) = socket.split();

		let send_task = tokio::spawn(async move {
			while let Some(msg) = rx_stream.next().await {
				if ws_tx.send(msg).await.is_err() {
					break;
				}
			}
			let _ = ws_tx.close().await;
		});

		while let Some(msg) = ws_rx.next().await {
			match msg {
				Ok(Message::Text(text)) => {
					debug!(target: "wdproxy.hub", client = id, message = %text.as_str(), "ignoring observer message");
				}
				Ok(Message::Close(_)) => break,
				Ok(_) => {}
				Err(err) => {
					warn!(target: "wdproxy.hub", client = id, error = %err, "observer websocket error");
					break;
				}
			}
		}

		self.unsubscribe(id);
		send_task.abort();
		info!(target: "wdproxy.hub", client = id, "observer disconnected");
	}
}

impl SessionObserver for ObserverHub {
	fn session_created(&self, record: &SessionRecord) {
		self.broadcast(&ObserverEvent::NewSession(record.entry()));
	}

	fn session_removed(&self, record: &SessionRecord) {
		self.broadcast(&ObserverEvent::RemoveSession(record.entry()));
	}

	fn recording_ready(&self, record: &SessionRecord) {
		self.broadcast(&ObserverEvent::RecordedSession(record.entry()));
	}

	fn has_active_observers(&self) -> bool {
		!self.clients.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use serde_json::Value;
	use wdproxy::{Containers, Environment};

	use super::*;

	fn record() -> SessionRecord {
		Environment {
			hub_url: "http://127.0.0.1:1/wd/hub".into(),
			vnc_url: "http://127.0.0.1:3/vnc.html".into(),
			containers: Containers::single("wdproxy-browser-x"),
			browser: "firefox".into(),
			version: "66".into(),
			created_at: 42,
			manual_recording: false,
			correlation_id: None,
		}
		.into_session("s-9".into(), false, Duration::from_secs(60))
	}

	fn text(message: Message) -> Value {
		match message {
			Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn events_reach_every_subscriber() {
		let hub = ObserverHub::new();
		assert!(!hub.has_active_observers());
		let (_, mut a) = hub.subscribe();
		let (_, mut b) = hub.subscribe();
		assert!(hub.has_active_observers());

		hub.session_created(&record());

		for rx in [&mut a, &mut b] {
			let event = text(rx.try_recv().unwrap());
			assert_eq!(event["newSession"]["id"], "s-9");
			assert_eq!(event["newSession"]["hubContainerName"], "wdproxy-browser-x");
		}
	}

	#[test]
	fn closed_subscribers_are_pruned() {
		let hub = ObserverHub::new();
		let (_, rx) = hub.subscribe();
		let (_, mut live) = hub.subscribe();
		drop(rx);

		hub.recording_ready(&record());

		assert_eq!(hub.client_count(), 1);
		assert!(text(live.try_recv().unwrap()).get("recordedSession").is_some());
	}

	#[test]
	fn unsubscribe_deactivates() {
		let hub = ObserverHub::new();
		let (id, _rx) = hub.subscribe();
		hub.unsubscribe(id);
		assert!(!hub.has_active_observers());
	}
}

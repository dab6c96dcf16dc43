//! In-process message transport: named persistent ports plus broadcast.
//!
//! Stands in for the host platform's messaging primitives. A foreground
//! context connects a [`Port`] by name; the background context accepts it
//! from a [`PortListener`]. Dropping either end disconnects the pair, which
//! the surviving end observes as `recv() -> None`. Separately, the hub
//! carries fire-and-forget [`UpdateNotice`] broadcasts to every current
//! subscriber, including the sender's own (receivers filter by origin).

use std::collections::HashMap;
use std::sync::Mutex;

use crosscell_proto::{SyncFrame, UpdateNotice};
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport-level failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
	/// No listener is registered for the requested port name.
	#[error("no listener registered for port {0:?}")]
	NoListener(String),

	/// The peer end of the port is gone.
	#[error("port disconnected")]
	Disconnected,
}

/// Identifier for one established port connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(u64);

struct HubState {
	listeners: HashMap<String, mpsc::UnboundedSender<Port>>,
	notice_subs: Vec<mpsc::UnboundedSender<UpdateNotice>>,
	next_port: u64,
}

/// Shared in-process message hub for one simulated host runtime.
pub struct MessageHub {
	state: Mutex<HubState>,
}

impl Default for MessageHub {
	fn default() -> Self {
		Self::new()
	}
}

impl MessageHub {
	/// Creates an empty hub with no listeners or subscribers.
	#[must_use]
	pub fn new() -> Self {
		Self {
			state: Mutex::new(HubState {
				listeners: HashMap::new(),
				notice_subs: Vec::new(),
				next_port: 0,
			}),
		}
	}

	/// Registers a listener for inbound connections on a port name.
	///
	/// Replaces any previous listener for the same name; the replaced
	/// listener stops receiving connections but its established ports stay
	/// alive.
	pub fn listen(&self, port_name: &str) -> PortListener {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut state = self.state.lock().unwrap();
		state.listeners.insert(port_name.to_string(), tx);
		PortListener { rx }
	}

	/// Opens a persistent bidirectional channel to the named listener.
	pub fn connect(&self, port_name: &str) -> Result<Port, TransportError> {
		let mut state = self.state.lock().unwrap();
		let id = PortId(state.next_port);
		state.next_port += 1;

		let (to_listener_tx, to_listener_rx) = mpsc::unbounded_channel();
		let (to_caller_tx, to_caller_rx) = mpsc::unbounded_channel();

		let caller_port = Port {
			sink: PortSink {
				id,
				tx: to_listener_tx,
			},
			source: PortSource { rx: to_caller_rx },
		};
		let listener_port = Port {
			sink: PortSink {
				id,
				tx: to_caller_tx,
			},
			source: PortSource { rx: to_listener_rx },
		};

		let listener = state
			.listeners
			.get(port_name)
			.ok_or_else(|| TransportError::NoListener(port_name.to_string()))?;
		listener
			.send(listener_port)
			.map_err(|_| TransportError::NoListener(port_name.to_string()))?;

		Ok(caller_port)
	}

	/// Fire-and-forget broadcast to every current notice subscriber.
	pub fn broadcast(&self, notice: UpdateNotice) {
		let mut state = self.state.lock().unwrap();
		state
			.notice_subs
			.retain(|tx| tx.send(notice.clone()).is_ok());
	}

	/// Subscribes to all future broadcasts.
	pub fn notices(&self) -> NoticeStream {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut state = self.state.lock().unwrap();
		state.notice_subs.push(tx);
		NoticeStream { rx }
	}
}

/// Background-side stream of inbound port connections.
pub struct PortListener {
	rx: mpsc::UnboundedReceiver<Port>,
}

impl PortListener {
	/// Waits for the next inbound connection.
	///
	/// Returns `None` when the hub is gone or this listener was replaced.
	pub async fn accept(&mut self) -> Option<Port> {
		self.rx.recv().await
	}
}

/// One end of an established port.
#[derive(Debug)]
pub struct Port {
	sink: PortSink,
	source: PortSource,
}

impl Port {
	/// Returns the connection identifier shared by both ends.
	#[must_use]
	pub fn id(&self) -> PortId {
		self.sink.id
	}

	/// Sends a frame to the peer.
	pub fn send(&self, frame: SyncFrame) -> Result<(), TransportError> {
		self.sink.send(frame)
	}

	/// Receives the next frame. `None` signals peer disconnect.
	pub async fn recv(&mut self) -> Option<SyncFrame> {
		self.source.recv().await
	}

	/// Splits into independently-owned send and receive halves.
	#[must_use]
	pub fn split(self) -> (PortSink, PortSource) {
		(self.sink, self.source)
	}
}

/// Send half of a port.
#[derive(Clone, Debug)]
pub struct PortSink {
	id: PortId,
	tx: mpsc::UnboundedSender<SyncFrame>,
}

impl PortSink {
	/// Returns the connection identifier.
	#[must_use]
	pub fn id(&self) -> PortId {
		self.id
	}

	/// Sends a frame to the peer.
	pub fn send(&self, frame: SyncFrame) -> Result<(), TransportError> {
		self.tx
			.send(frame)
			.map_err(|_| TransportError::Disconnected)
	}
}

/// Receive half of a port.
#[derive(Debug)]
pub struct PortSource {
	rx: mpsc::UnboundedReceiver<SyncFrame>,
}

impl PortSource {
	/// Receives the next frame. `None` signals peer disconnect.
	pub async fn recv(&mut self) -> Option<SyncFrame> {
		self.rx.recv().await
	}
}

/// Stream of broadcast notices.
pub struct NoticeStream {
	rx: mpsc::UnboundedReceiver<UpdateNotice>,
}

impl NoticeStream {
	/// Receives the next notice. `None` when the hub is gone.
	pub async fn recv(&mut self) -> Option<UpdateNotice> {
		self.rx.recv().await
	}

	/// Non-blocking receive for drain-style assertions.
	pub fn try_recv(&mut self) -> Option<UpdateNotice> {
		self.rx.try_recv().ok()
	}
}

#[cfg(test)]
mod tests {
	use crosscell_proto::{ChangeIntent, SyncerId};

	use super::*;

	fn intent_frame(payload: &str) -> SyncFrame {
		SyncFrame::Intent(ChangeIntent {
			expected_correlation_id: None,
			payload: payload.to_string(),
		})
	}

	#[tokio::test]
	async fn connect_without_listener_fails() {
		let hub = MessageHub::new();
		let err = hub.connect("folders_port").unwrap_err();
		assert_eq!(err, TransportError::NoListener("folders_port".to_string()));
	}

	#[tokio::test]
	async fn frames_flow_both_ways() {
		let hub = MessageHub::new();
		let mut listener = hub.listen("folders_port");
		let mut caller = hub.connect("folders_port").unwrap();
		let mut accepted = listener.accept().await.unwrap();
		assert_eq!(caller.id(), accepted.id());

		caller.send(intent_frame("\"up\"")).unwrap();
		assert_eq!(accepted.recv().await, Some(intent_frame("\"up\"")));

		accepted.send(intent_frame("\"down\"")).unwrap();
		assert_eq!(caller.recv().await, Some(intent_frame("\"down\"")));
	}

	#[tokio::test]
	async fn dropping_one_end_disconnects_the_peer() {
		let hub = MessageHub::new();
		let mut listener = hub.listen("folders_port");
		let caller = hub.connect("folders_port").unwrap();
		let mut accepted = listener.accept().await.unwrap();

		drop(caller);
		assert_eq!(accepted.recv().await, None);
	}

	#[tokio::test]
	async fn broadcast_reaches_all_subscribers_including_sender_side() {
		let hub = MessageHub::new();
		let mut a = hub.notices();
		let mut b = hub.notices();

		let notice = UpdateNotice {
			command: "folders_update".to_string(),
			origin: SyncerId::fresh(),
		};
		hub.broadcast(notice.clone());

		assert_eq!(a.recv().await, Some(notice.clone()));
		assert_eq!(b.recv().await, Some(notice));
	}

	#[tokio::test]
	async fn broadcast_skips_subscribers_registered_after_the_fact() {
		let hub = MessageHub::new();
		hub.broadcast(UpdateNotice {
			command: "folders_update".to_string(),
			origin: SyncerId::fresh(),
		});

		let mut late = hub.notices();
		assert!(late.try_recv().is_none());
	}
}

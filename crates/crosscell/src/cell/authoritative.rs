//! Actor owning the canonical value for one synchronized channel.

use std::collections::HashMap;

use crosscell_proto::{ChangeIntent, CorrelationId, SyncFrame, ValueEnvelope, port_name};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::rehydrate::Rehydrator;
use crate::transport::{MessageHub, Port, PortId, PortListener, PortSink};

/// Commands accepted by the authoritative cell actor.
enum AuthoritativeCmd<T> {
	/// Replace the canonical value and push it to every mirror.
	Publish { value: T },
	/// Read the canonical value.
	Current { reply: oneshot::Sender<Option<T>> },
	/// Count currently registered mirror connections.
	ConnectedPorts { reply: oneshot::Sender<usize> },
}

/// Frame traffic and lifecycle events funneled in from per-port readers.
enum PortEvent {
	Frame { port: PortId, frame: SyncFrame },
	Closed { port: PortId },
}

/// Handle for one channel's authoritative cell.
#[derive(Debug)]
pub struct AuthoritativeHandle<T> {
	tx: mpsc::Sender<AuthoritativeCmd<T>>,
	local: watch::Receiver<Option<T>>,
}

impl<T> Clone for AuthoritativeHandle<T> {
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
			local: self.local.clone(),
		}
	}
}

impl<T: Send> AuthoritativeHandle<T> {
	/// Replaces the canonical value and pushes it to every connected mirror.
	///
	/// Fire-and-forget: the caller observes the effect, like any mirror,
	/// through the subscription surface.
	pub async fn publish(&self, value: T) {
		let _ = self.tx.send(AuthoritativeCmd::Publish { value }).await;
	}

	/// Reads the canonical value. `None` before the first publish or after
	/// the actor has shut down.
	pub async fn current(&self) -> Option<T> {
		let (reply, rx) = oneshot::channel();
		if self
			.tx
			.send(AuthoritativeCmd::Current { reply })
			.await
			.is_err()
		{
			return None;
		}
		rx.await.ok().flatten()
	}

	/// Number of currently registered mirror connections.
	pub async fn connected_ports(&self) -> usize {
		let (reply, rx) = oneshot::channel();
		if self
			.tx
			.send(AuthoritativeCmd::ConnectedPorts { reply })
			.await
			.is_err()
		{
			return 0;
		}
		rx.await.unwrap_or(0)
	}

	/// Subscribes to canonical value changes as seen in this context.
	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
		self.local.clone()
	}
}

/// Actor service owning the canonical value for one channel.
///
/// All mutation flows through the single run loop: intents apply in
/// delivery order, and each publish finishes sending to every registered
/// port before the next command is taken.
pub struct AuthoritativeCell<T> {
	channel: String,
	rehydrator: Rehydrator<T>,
	rx: mpsc::Receiver<AuthoritativeCmd<T>>,
	listener: PortListener,
	listener_open: bool,
	events_tx: mpsc::UnboundedSender<PortEvent>,
	events_rx: mpsc::UnboundedReceiver<PortEvent>,
	ports: HashMap<PortId, PortSink>,
	value: Option<T>,
	last_envelope: Option<ValueEnvelope>,
	local: watch::Sender<Option<T>>,
}

impl<T> AuthoritativeCell<T>
where
	T: Clone + Serialize + Send + Sync + 'static,
{
	/// Spawns the cell actor for a channel.
	///
	/// The port listener is registered before the actor loop starts, so no
	/// early mirror connection can be missed.
	pub fn start(
		hub: &MessageHub,
		channel: impl Into<String>,
		rehydrator: Rehydrator<T>,
	) -> AuthoritativeHandle<T> {
		let channel = channel.into();
		let listener = hub.listen(&port_name(&channel));
		let (tx, rx) = mpsc::channel(64);
		let (local_tx, local_rx) = watch::channel(None);
		let (events_tx, events_rx) = mpsc::unbounded_channel();

		let cell = Self {
			channel,
			rehydrator,
			rx,
			listener,
			listener_open: true,
			events_tx,
			events_rx,
			ports: HashMap::new(),
			value: None,
			last_envelope: None,
			local: local_tx,
		};
		tokio::spawn(cell.run());

		AuthoritativeHandle {
			tx,
			local: local_rx,
		}
	}

	async fn run(mut self) {
		loop {
			tokio::select! {
				cmd = self.rx.recv() => {
					let Some(cmd) = cmd else {
						break;
					};
					match cmd {
						AuthoritativeCmd::Publish { value } => self.apply_publish(value),
						AuthoritativeCmd::Current { reply } => {
							let _ = reply.send(self.value.clone());
						}
						AuthoritativeCmd::ConnectedPorts { reply } => {
							let _ = reply.send(self.ports.len());
						}
					}
				}
				conn = self.listener.accept(), if self.listener_open => {
					match conn {
						Some(port) => self.handle_connect(port),
						None => self.listener_open = false,
					}
				}
				event = self.events_rx.recv() => {
					// The actor holds an events_tx clone, so this arm never
					// yields None while the loop runs.
					match event {
						Some(PortEvent::Frame { port, frame }) => self.handle_frame(port, frame),
						Some(PortEvent::Closed { port }) => self.handle_disconnect(port),
						None => break,
					}
				}
			}
		}
	}

	/// Registers a fresh mirror connection and catches it up.
	///
	/// Registration and the catch-up push happen in one handler turn, so a
	/// concurrent publish can never slip between them.
	fn handle_connect(&mut self, port: Port) {
		let (sink, mut source) = port.split();
		let id = sink.id();
		tracing::debug!(channel = %self.channel, port = ?id, "mirror connected");

		if let Some(envelope) = &self.last_envelope {
			let _ = sink.send(SyncFrame::Envelope(envelope.clone()));
		}
		self.ports.insert(id, sink);

		let events = self.events_tx.clone();
		tokio::spawn(async move {
			while let Some(frame) = source.recv().await {
				if events.send(PortEvent::Frame { port: id, frame }).is_err() {
					return;
				}
			}
			let _ = events.send(PortEvent::Closed { port: id });
		});
	}

	fn handle_frame(&mut self, port: PortId, frame: SyncFrame) {
		match frame {
			SyncFrame::Intent(intent) => self.handle_intent(port, intent),
			SyncFrame::Envelope(_) => {
				tracing::debug!(channel = %self.channel, port = ?port, "ignoring envelope on authoritative side");
			}
		}
	}

	/// Applies a proposed change if it was made against the current value.
	fn handle_intent(&mut self, port: PortId, intent: ChangeIntent) {
		if intent.expected_correlation_id.as_ref() != self.correlation() {
			tracing::debug!(channel = %self.channel, port = ?port, "discarding stale change intent");
			return;
		}
		match super::decode_value(&intent.payload, &self.rehydrator) {
			Ok(value) => self.apply_publish(value),
			Err(err) => {
				tracing::warn!(channel = %self.channel, port = ?port, error = %err, "discarding malformed change intent");
			}
		}
	}

	/// Removes a closed connection. Safe to call twice for the same port.
	fn handle_disconnect(&mut self, port: PortId) {
		if self.ports.remove(&port).is_some() {
			tracing::debug!(channel = %self.channel, port = ?port, "mirror disconnected");
		}
	}

	fn apply_publish(&mut self, value: T) {
		let correlation_id = CorrelationId::fresh();
		// A synchronized type that cannot serialize is a wiring bug, not a
		// runtime condition; fail loudly instead of desyncing mirrors.
		let payload = crosscell_proto::encode_payload(&value)
			.expect("synchronized values must serialize to JSON");

		self.value = Some(value.clone());
		let _ = self.local.send(Some(value));

		let envelope = ValueEnvelope {
			correlation_id,
			payload,
		};
		self.last_envelope = Some(envelope.clone());
		self.ports
			.retain(|_, sink| sink.send(SyncFrame::Envelope(envelope.clone())).is_ok());
	}

	fn correlation(&self) -> Option<&CorrelationId> {
		self.last_envelope.as_ref().map(|env| &env.correlation_id)
	}
}

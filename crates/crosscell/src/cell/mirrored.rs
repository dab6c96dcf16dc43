//! Non-authoritative local cache of a synchronized value.

use std::sync::Arc;

use crosscell_proto::{ChangeIntent, CorrelationId, SyncFrame, port_name};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::SyncError;
use crate::rehydrate::Rehydrator;
use crate::transport::{MessageHub, PortSink, PortSource, TransportError};

/// A mirror's view of the synchronized value.
#[derive(Debug)]
pub struct MirrorState<T> {
	/// The cached value. `None` until the first envelope arrives.
	pub value: Option<T>,
	/// Correlation id of the most recent envelope, whether or not its
	/// payload decoded.
	pub correlation: Option<CorrelationId>,
	/// Decode failure of the most recent envelope. The prior value stays
	/// in `value`; assignment only happens after a successful decode.
	pub fault: Option<Arc<SyncError>>,
}

impl<T: Clone> Clone for MirrorState<T> {
	fn clone(&self) -> Self {
		Self {
			value: self.value.clone(),
			correlation: self.correlation.clone(),
			fault: self.fault.clone(),
		}
	}
}

impl<T> Default for MirrorState<T> {
	fn default() -> Self {
		Self {
			value: None,
			correlation: None,
			fault: None,
		}
	}
}

/// Read-mostly local cache of one channel's canonical value.
///
/// Local `publish` calls never touch the cache; they send a change intent
/// to the authoritative cell, and the cache moves when (and if) the
/// confirming envelope comes back. A dropped transport simply halts
/// updates; the owning context constructs a new cell when it restarts.
#[derive(Clone, Debug)]
pub struct MirroredCell<T> {
	channel: String,
	sink: PortSink,
	state: watch::Receiver<MirrorState<T>>,
}

impl<T> MirroredCell<T>
where
	T: Clone + Serialize + Send + Sync + 'static,
{
	/// Opens the persistent channel to the authoritative cell and starts
	/// mirroring.
	pub fn connect(
		hub: &MessageHub,
		channel: impl Into<String>,
		rehydrator: Rehydrator<T>,
	) -> Result<Self, TransportError> {
		let channel = channel.into();
		let port = hub.connect(&port_name(&channel))?;
		let (sink, source) = port.split();
		let (state_tx, state_rx) = watch::channel(MirrorState::default());

		tokio::spawn(mirror_loop(channel.clone(), source, rehydrator, state_tx));

		Ok(Self {
			channel,
			sink,
			state: state_rx,
		})
	}

	/// Proposes a new value to the authoritative cell.
	///
	/// Does not update local state; the effect, if the proposal is
	/// accepted, arrives asynchronously as an envelope. Serialization
	/// failure is a wiring bug and fails loudly.
	pub fn publish(&self, value: &T) {
		let payload = crosscell_proto::encode_payload(value)
			.expect("synchronized values must serialize to JSON");
		let intent = ChangeIntent {
			expected_correlation_id: self.state.borrow().correlation.clone(),
			payload,
		};
		if self.sink.send(SyncFrame::Intent(intent)).is_err() {
			tracing::debug!(channel = %self.channel, "dropping change intent; port disconnected");
		}
	}

	/// Returns the current mirror state.
	#[must_use]
	pub fn state(&self) -> MirrorState<T> {
		self.state.borrow().clone()
	}

	/// Returns the cached value, if any envelope has been accepted yet.
	#[must_use]
	pub fn current(&self) -> Option<T> {
		self.state.borrow().value.clone()
	}

	/// Subscribes to mirror state changes.
	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<MirrorState<T>> {
		self.state.clone()
	}

	/// The logical channel this mirror tracks.
	#[must_use]
	pub fn channel(&self) -> &str {
		&self.channel
	}
}

async fn mirror_loop<T: Clone>(
	channel: String,
	mut source: PortSource,
	rehydrator: Rehydrator<T>,
	state: watch::Sender<MirrorState<T>>,
) {
	while let Some(frame) = source.recv().await {
		let envelope = match frame {
			SyncFrame::Envelope(envelope) => envelope,
			SyncFrame::Intent(_) => {
				tracing::debug!(channel = %channel, "ignoring change intent on mirror side");
				continue;
			}
		};

		if state.borrow().correlation.as_ref() == Some(&envelope.correlation_id) {
			tracing::debug!(channel = %channel, "discarding duplicate envelope");
			continue;
		}

		let decoded = super::decode_value(&envelope.payload, &rehydrator);
		state.send_modify(|mirror| {
			// The correlation id is recorded even when the payload fails to
			// decode, so a retried local publish races against the envelope
			// that was actually sent, not an older one.
			mirror.correlation = Some(envelope.correlation_id.clone());
			match decoded {
				Ok(value) => {
					mirror.value = Some(value);
					mirror.fault = None;
				}
				Err(err) => {
					mirror.fault = Some(Arc::new(err));
				}
			}
		});
	}
	tracing::debug!(channel = %channel, "mirror port disconnected");
}

//! Wire types for the crosscell synchronization protocol.
//!
//! These structures cross the isolation boundary between execution contexts.
//! Value payloads are carried as JSON-encoded strings inside plain message
//! structs: the outer shape stays transport-agnostic, and no transport's
//! structural-clone rules can mangle the inner value.

use serde::{Deserialize, Serialize};

/// Opaque token identifying one specific push of a synchronized value.
///
/// Unique per push for the lifetime of one authoritative cell. Carries no
/// ordering; staleness checks are equality checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
	/// Draws a fresh random identifier.
	#[must_use]
	pub fn fresh() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}
}

/// Opaque identifier for one session syncer instance.
///
/// Used to filter a syncer's own broadcasts out of its notice stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncerId(pub String);

impl SyncerId {
	/// Draws a fresh random identifier.
	#[must_use]
	pub fn fresh() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}
}

/// Authoritative push of the current value to a mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueEnvelope {
	/// Identifier assigned to this push.
	pub correlation_id: CorrelationId,
	/// JSON-encoded string of the current value.
	pub payload: String,
}

/// Proposed new value sent from a mirror to the authoritative cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeIntent {
	/// The last correlation id the mirror observed. `None` until the mirror
	/// has received its first envelope.
	pub expected_correlation_id: Option<CorrelationId>,
	/// JSON-encoded string of the proposed value.
	pub payload: String,
}

/// Classification of frames exchanged over a synchronization port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncFrame {
	/// Authoritative → mirror value push.
	Envelope(ValueEnvelope),
	/// Mirror → authoritative change proposal.
	Intent(ChangeIntent),
}

/// Lightweight broadcast telling other contexts a session value changed.
///
/// Carries only the originating syncer's identity; receivers re-read the
/// value from the scratch store themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotice {
	/// Command name derived from the session key.
	pub command: String,
	/// The syncer instance that produced the change.
	pub origin: SyncerId,
}

//! Synchronized value cells: one authoritative owner, many mirrors.
//!
//! The authoritative cell runs in the privileged context and is the single
//! source of truth for one logical channel. Mirrors in other contexts hold
//! a read-only cached copy and propose changes by sending intents back;
//! their copy only moves when the authoritative cell pushes a confirming
//! envelope.
//!
//! # Invariants
//!
//! - The canonical value mutates only through the authoritative cell's own
//!   publish path (local call or accepted intent), never through a push.
//! - A mirror's cached value mutates only on an accepted envelope; local
//!   publish calls leave it untouched until the round trip completes.
//! - A port registration never outlives its transport connection.

mod authoritative;
mod mirrored;

pub use authoritative::{AuthoritativeCell, AuthoritativeHandle};
pub use mirrored::{MirrorState, MirroredCell};

use crate::error::SyncError;
use crate::rehydrate::Rehydrator;

/// Decodes a wire payload string and rebuilds it into the rich type.
fn decode_value<T>(payload: &str, rehydrator: &Rehydrator<T>) -> Result<T, SyncError> {
	let plain = crosscell_proto::decode_payload(payload)?;
	rehydrator.rebuild(plain)
}

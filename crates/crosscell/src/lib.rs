//! Cross-context synchronization of in-memory session state.
//!
//! Keeps a security-sensitive value (decrypted session data) consistent
//! between one privileged context and any number of isolated foreground
//! contexts that share no memory, over an asynchronous message transport:
//!
//! * [`AuthoritativeCell`]: single-owner actor holding the canonical value
//! * [`MirroredCell`]: read-mostly cached copy in a foreground context
//! * [`SessionSyncer`]: binds an arbitrary reactive stream to the protocol
//! * [`SyncRegistry`]: composition root owning per-channel cell instances
//!
//! # Mental Model
//!
//! The authoritative cell serializes all mutation: local publishes and
//! accepted change intents each assign a fresh correlation id and push the
//! new value to every connected mirror, including the one that proposed
//! it. Mirrors never mutate themselves; they observe. Eventual consistency
//! is implicit: a caller who needs to see its own change subscribes to the
//! synchronized stream rather than assuming synchronous effect.

pub mod cell;
pub mod error;
pub mod reactive;
pub mod registry;
pub mod rehydrate;
pub mod scratch;
pub mod syncer;
pub mod transport;

#[cfg(test)]
mod tests;

pub use cell::{AuthoritativeCell, AuthoritativeHandle, MirrorState, MirroredCell};
pub use error::{Result, SyncError};
pub use reactive::{Replay, Subject, SubjectStream};
pub use registry::{RegistryError, SyncRegistry};
pub use rehydrate::{Rehydrator, RehydratorRegistry};
pub use scratch::{MemoryScratchStore, ScratchStore, StoreError};
pub use syncer::{SessionSyncer, SuppressGate, SyncerError, SyncerMetadata};
pub use transport::{
	MessageHub, NoticeStream, Port, PortId, PortListener, PortSink, PortSource, TransportError,
};

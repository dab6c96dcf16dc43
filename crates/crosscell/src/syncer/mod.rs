//! Binds an arbitrary reactive value stream to cross-context sync.
//!
//! A session syncer watches a locally-owned [`Subject`], persists every new
//! value to the scratch store, and broadcasts a payload-free update notice
//! so syncers for the same session key in other contexts re-read the store.
//! Values that arrive by notice are re-injected into the local subject
//! behind the suppression gate, so a remote update never echoes back out as
//! a second broadcast.

mod gate;

pub use gate::SuppressGate;

use std::sync::Arc;

use crosscell_proto::{SyncerId, UpdateNotice, update_command};
use serde::Serialize;
use thiserror::Error;

use crate::reactive::Subject;
use crate::rehydrate::Rehydrator;
use crate::scratch::{ScratchStore, StoreError};
use crate::transport::MessageHub;

/// Session syncer construction failures. These are misconfigurations, not
/// runtime conditions.
#[derive(Debug, Error)]
pub enum SyncerError {
	/// Neither a constructor nor an initializer rehydrator was supplied.
	#[error("either a constructor or an initializer must be provided")]
	MissingRebuilder,
}

/// Static description of one synchronized session value.
pub struct SyncerMetadata<T> {
	session_key: String,
	constructor: Option<Rehydrator<T>>,
	initializer: Option<Rehydrator<T>>,
}

impl<T> SyncerMetadata<T> {
	/// Describes a session value rebuilt through its type's constructor.
	pub fn with_constructor(session_key: impl Into<String>, constructor: Rehydrator<T>) -> Self {
		Self {
			session_key: session_key.into(),
			constructor: Some(constructor),
			initializer: None,
		}
	}

	/// Describes a session value rebuilt through a free initializer.
	pub fn with_initializer(session_key: impl Into<String>, initializer: Rehydrator<T>) -> Self {
		Self {
			session_key: session_key.into(),
			constructor: None,
			initializer: Some(initializer),
		}
	}

	/// The scratch-store key this value lives under.
	#[must_use]
	pub fn session_key(&self) -> &str {
		&self.session_key
	}

	/// The effective rebuild function; the initializer wins when both are
	/// supplied.
	fn rebuilder(&self) -> Option<Rehydrator<T>> {
		self.initializer
			.clone()
			.or_else(|| self.constructor.clone())
	}
}

/// Shared pieces used by both the forwarding and notice tasks.
struct SyncerCore<T> {
	session_key: String,
	rebuild: Rehydrator<T>,
	gate: SuppressGate,
	subject: Subject<T>,
	store: Arc<dyn ScratchStore>,
}

impl<T: Clone> SyncerCore<T> {
	/// Re-reads the scratch value fresh and re-injects it locally.
	async fn adopt_scratch_value(&self) -> Result<(), StoreError> {
		let Some(plain) = self.store.get_bypass_cache(&self.session_key).await? else {
			return Ok(());
		};
		match self.rebuild.rebuild(plain) {
			Ok(value) => {
				// No await between arm and emit: the suppression pairs with
				// this emission and no other.
				self.gate.arm();
				self.subject.emit(value);
			}
			Err(err) => {
				tracing::warn!(session_key = %self.session_key, error = %err, "scratch value failed to rehydrate");
			}
		}
		Ok(())
	}
}

/// Keeps one reactive session value in sync across contexts.
pub struct SessionSyncer<T> {
	id: SyncerId,
	command: String,
	hub: Arc<MessageHub>,
	core: Arc<SyncerCore<T>>,
}

impl<T> SessionSyncer<T>
where
	T: Clone + Serialize + Send + Sync + 'static,
{
	/// Builds a syncer over an existing subject and scratch store.
	pub fn new(
		hub: Arc<MessageHub>,
		subject: Subject<T>,
		store: Arc<dyn ScratchStore>,
		metadata: SyncerMetadata<T>,
	) -> Result<Self, SyncerError> {
		let rebuild = metadata.rebuilder().ok_or(SyncerError::MissingRebuilder)?;
		Ok(Self {
			id: SyncerId::fresh(),
			command: update_command(&metadata.session_key),
			hub,
			core: Arc::new(SyncerCore {
				session_key: metadata.session_key,
				rebuild,
				gate: SuppressGate::new(),
				subject,
				store,
			}),
		})
	}

	/// This syncer's instance identity, as carried in its notices.
	#[must_use]
	pub fn id(&self) -> &SyncerId {
		&self.id
	}

	/// Starts synchronization.
	///
	/// Ignores the subject's current replay backlog, begins forwarding live
	/// emissions, adopts a pre-existing scratch value if another context
	/// already synchronized one (the restart race), and finally starts
	/// listening for update notices.
	pub async fn init(&self) -> Result<(), StoreError> {
		let initial_ignore = self.core.subject.replay_len();
		self.observe(initial_ignore);
		if self.core.store.has(&self.core.session_key).await? {
			self.core.adopt_scratch_value().await?;
		}
		self.listen_for_notices();
		Ok(())
	}

	/// Re-reads the scratch value, bypassing any in-process cache, and
	/// re-injects it into the wrapped subject without echoing a broadcast.
	pub async fn update(&self) -> Result<(), StoreError> {
		self.core.adopt_scratch_value().await
	}

	/// Forwards admitted local emissions out: persist, then notify.
	fn observe(&self, initial_ignore: usize) {
		// Subscribe before anything can emit so the gate and the ignore
		// count line up with the emissions this task actually sees.
		let mut stream = self.core.subject.subscribe();
		let core = Arc::clone(&self.core);
		let hub = Arc::clone(&self.hub);
		let command = self.command.clone();
		let origin = self.id.clone();

		// Runs until the subject is dropped; foreground contexts are torn
		// down wholesale, which ends the task with them.
		tokio::spawn(async move {
			let mut backlog = initial_ignore;
			while let Some(value) = stream.recv().await {
				if backlog > 0 {
					backlog -= 1;
					continue;
				}
				if !core.gate.admit() {
					continue;
				}
				let plain = serde_json::to_value(&value)
					.expect("synchronized values must serialize to JSON");
				if let Err(err) = core.store.save(&core.session_key, plain).await {
					tracing::warn!(session_key = %core.session_key, error = %err, "failed to persist session value; skipping update notice");
					continue;
				}
				hub.broadcast(UpdateNotice {
					command: command.clone(),
					origin: origin.clone(),
				});
			}
		});
	}

	/// Applies updates announced by syncers in other contexts.
	fn listen_for_notices(&self) {
		let mut notices = self.hub.notices();
		let core = Arc::clone(&self.core);
		let command = self.command.clone();
		let id = self.id.clone();

		tokio::spawn(async move {
			while let Some(notice) = notices.recv().await {
				if notice.command != command || notice.origin == id {
					continue;
				}
				if let Err(err) = core.adopt_scratch_value().await {
					tracing::warn!(command = %command, error = %err, "failed to apply remote session update");
				}
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use crate::reactive::Replay;
	use crate::scratch::MemoryScratchStore;

	use super::*;

	#[tokio::test]
	async fn construction_requires_a_rebuilder() {
		let hub = Arc::new(MessageHub::new());
		let store: Arc<dyn ScratchStore> = Arc::new(MemoryScratchStore::new());
		let metadata = SyncerMetadata::<Vec<String>> {
			session_key: "folderService_folders".to_string(),
			constructor: None,
			initializer: None,
		};

		let result = SessionSyncer::new(hub, Subject::new(Replay::None), store, metadata);
		assert!(matches!(result, Err(SyncerError::MissingRebuilder)));
	}

	#[tokio::test]
	async fn initializer_wins_over_constructor() {
		let metadata = SyncerMetadata {
			session_key: "k".to_string(),
			constructor: Some(Rehydrator::new(|_| Ok("ctor".to_string()))),
			initializer: Some(Rehydrator::new(|_| Ok("init".to_string()))),
		};

		let rebuilt = metadata
			.rebuilder()
			.unwrap()
			.rebuild(serde_json::Value::Null)
			.unwrap();
		assert_eq!(rebuilt, "init");
	}
}

//! Explicit composition root for per-channel cell instances.
//!
//! Cell instances are keyed by channel name but owned here, created once on
//! first request and handed out as cloned handles. Call sites receive their
//! cells by injection instead of reaching for module-level singletons.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;

use crate::cell::{AuthoritativeCell, AuthoritativeHandle, MirroredCell};
use crate::rehydrate::RehydratorRegistry;
use crate::transport::{MessageHub, TransportError};

/// Failures when requesting a cell from the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
	/// No rehydrator was registered for the channel.
	#[error("no rehydrator registered for channel {0:?}")]
	UnknownChannel(String),

	/// The channel's rehydrator was registered under a different type.
	#[error("channel {0:?} is registered under a different value type")]
	TypeMismatch(String),

	/// The underlying transport refused the connection.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Process-wide owner of synchronized cell instances.
pub struct SyncRegistry {
	hub: Arc<MessageHub>,
	rehydrators: RehydratorRegistry,
	authoritative: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
	mirrored: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl SyncRegistry {
	/// Builds the registry over a hub and a fully-populated rehydrator set.
	pub fn new(hub: Arc<MessageHub>, rehydrators: RehydratorRegistry) -> Self {
		Self {
			hub,
			rehydrators,
			authoritative: Mutex::new(HashMap::new()),
			mirrored: Mutex::new(HashMap::new()),
		}
	}

	/// The hub this registry wires cells onto.
	#[must_use]
	pub fn hub(&self) -> &Arc<MessageHub> {
		&self.hub
	}

	/// Returns the authoritative cell for a channel, starting it on first
	/// request. Must be called within an async runtime.
	pub fn authoritative<T>(&self, channel: &str) -> Result<AuthoritativeHandle<T>, RegistryError>
	where
		T: Clone + Serialize + Send + Sync + 'static,
	{
		let mut cells = self.authoritative.lock().unwrap();
		if let Some(existing) = cells.get(channel) {
			return existing
				.downcast_ref::<AuthoritativeHandle<T>>()
				.cloned()
				.ok_or_else(|| RegistryError::TypeMismatch(channel.to_string()));
		}

		let rehydrator = self
			.rehydrators
			.lookup::<T>(channel)
			.ok_or_else(|| self.missing(channel))?;
		let handle = AuthoritativeCell::start(&self.hub, channel, rehydrator);
		cells.insert(channel.to_string(), Box::new(handle.clone()));
		Ok(handle)
	}

	/// Returns the mirrored cell for a channel, connecting it on first
	/// request. Must be called within an async runtime.
	pub fn mirrored<T>(&self, channel: &str) -> Result<MirroredCell<T>, RegistryError>
	where
		T: Clone + Serialize + Send + Sync + 'static,
	{
		let mut cells = self.mirrored.lock().unwrap();
		if let Some(existing) = cells.get(channel) {
			return existing
				.downcast_ref::<MirroredCell<T>>()
				.cloned()
				.ok_or_else(|| RegistryError::TypeMismatch(channel.to_string()));
		}

		let rehydrator = self
			.rehydrators
			.lookup::<T>(channel)
			.ok_or_else(|| self.missing(channel))?;
		let cell = MirroredCell::connect(&self.hub, channel, rehydrator)?;
		cells.insert(channel.to_string(), Box::new(cell.clone()));
		Ok(cell)
	}

	fn missing(&self, channel: &str) -> RegistryError {
		if self.rehydrators.contains(channel) {
			RegistryError::TypeMismatch(channel.to_string())
		} else {
			RegistryError::UnknownChannel(channel.to_string())
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::rehydrate::Rehydrator;

	use super::*;

	fn registry() -> SyncRegistry {
		let mut rehydrators = RehydratorRegistry::new();
		rehydrators.register("folders", Rehydrator::<Vec<String>>::of());
		SyncRegistry::new(Arc::new(MessageHub::new()), rehydrators)
	}

	#[tokio::test]
	async fn unknown_channel_is_rejected() {
		let registry = registry();
		let err = registry.authoritative::<Vec<String>>("ciphers").unwrap_err();
		assert!(matches!(err, RegistryError::UnknownChannel(_)));
	}

	#[tokio::test]
	async fn wrong_type_is_rejected_without_panicking() {
		let registry = registry();
		let err = registry.authoritative::<u64>("folders").unwrap_err();
		assert!(matches!(err, RegistryError::TypeMismatch(_)));
	}

	#[tokio::test]
	async fn repeated_requests_share_one_cell() {
		let registry = registry();
		let first = registry.authoritative::<Vec<String>>("folders").unwrap();
		let second = registry.authoritative::<Vec<String>>("folders").unwrap();

		first.publish(vec!["F1".to_string()]).await;
		// The second handle reads the same actor's state.
		let mut sub = second.subscribe();
		let seen = tokio::time::timeout(
			std::time::Duration::from_millis(500),
			sub.wait_for(|value| value.as_deref() == Some(&["F1".to_string()][..])),
		)
		.await
		.expect("canonical value did not propagate in time");
		assert!(seen.is_ok());
	}

	#[tokio::test]
	async fn mirrored_before_authoritative_fails_as_no_listener() {
		let registry = registry();
		let err = registry.mirrored::<Vec<String>>("folders").unwrap_err();
		assert!(matches!(
			err,
			RegistryError::Transport(TransportError::NoListener(_))
		));
	}
}

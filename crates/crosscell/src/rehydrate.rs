//! Rebuilding rich in-memory types from plain JSON trees.
//!
//! Crossing the context boundary strips values down to plain data. Every
//! synchronized type registers an explicit reconstruction function; nothing
//! here relies on runtime type tagging.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::SyncError;

/// Pure reconstruction function from a plain JSON tree to a rich type.
///
/// Must be total over every value its channel will carry and must not
/// retain references into the input tree.
pub struct Rehydrator<T> {
	build: Arc<dyn Fn(Value) -> Result<T, SyncError> + Send + Sync>,
}

impl<T> Clone for Rehydrator<T> {
	fn clone(&self) -> Self {
		Self {
			build: Arc::clone(&self.build),
		}
	}
}

impl<T> Rehydrator<T> {
	/// Wraps an explicit reconstruction function.
	pub fn new(build: impl Fn(Value) -> Result<T, SyncError> + Send + Sync + 'static) -> Self {
		Self {
			build: Arc::new(build),
		}
	}

	/// Rebuilds a value from its plain form.
	pub fn rebuild(&self, plain: Value) -> Result<T, SyncError> {
		(self.build)(plain)
	}
}

impl<T: DeserializeOwned> Rehydrator<T> {
	/// Standard rehydrator for types whose plain form is their serde shape.
	#[must_use]
	pub fn of() -> Self {
		Self::new(|plain| serde_json::from_value(plain).map_err(SyncError::MalformedPayload))
	}
}

/// Channel-name-keyed registry of rehydrators.
///
/// Populated once by the composition root at process start; lookups never
/// mutate it. A lookup under the wrong value type returns `None`.
#[derive(Default)]
pub struct RehydratorRegistry {
	entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl RehydratorRegistry {
	/// Creates an empty registry.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers the rehydrator for a channel, replacing any previous one.
	pub fn register<T: 'static>(&mut self, channel: &str, rehydrator: Rehydrator<T>) {
		self.entries.insert(channel.to_string(), Box::new(rehydrator));
	}

	/// Looks up the rehydrator for a channel under the given value type.
	#[must_use]
	pub fn lookup<T: 'static>(&self, channel: &str) -> Option<Rehydrator<T>> {
		self.entries
			.get(channel)
			.and_then(|entry| entry.downcast_ref::<Rehydrator<T>>())
			.cloned()
	}

	/// Returns whether any rehydrator is registered for the channel.
	#[must_use]
	pub fn contains(&self, channel: &str) -> bool {
		self.entries.contains_key(channel)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn standard_rehydrator_rebuilds_serde_shapes() {
		let rehydrator = Rehydrator::<Vec<String>>::of();
		let value = rehydrator.rebuild(json!(["F1", "F2"])).unwrap();
		assert_eq!(value, vec!["F1".to_string(), "F2".to_string()]);
	}

	#[test]
	fn standard_rehydrator_rejects_mismatched_shapes() {
		let rehydrator = Rehydrator::<Vec<String>>::of();
		assert!(rehydrator.rebuild(json!({"not": "a list"})).is_err());
	}

	#[test]
	fn explicit_factory_controls_reconstruction() {
		let rehydrator = Rehydrator::new(|plain: Value| {
			plain
				.as_str()
				.map(str::to_uppercase)
				.ok_or_else(|| SyncError::Rehydrate("expected a string".to_string()))
		});
		assert_eq!(rehydrator.rebuild(json!("abc")).unwrap(), "ABC");
		assert!(rehydrator.rebuild(json!(7)).is_err());
	}

	#[test]
	fn registry_lookup_is_typed() {
		let mut registry = RehydratorRegistry::new();
		registry.register("folders", Rehydrator::<Vec<String>>::of());

		assert!(registry.contains("folders"));
		assert!(registry.lookup::<Vec<String>>("folders").is_some());
		// Wrong type or unknown channel both miss.
		assert!(registry.lookup::<u64>("folders").is_none());
		assert!(registry.lookup::<Vec<String>>("ciphers").is_none());
	}
}

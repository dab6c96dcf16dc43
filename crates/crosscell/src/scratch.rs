//! Durable scratch store used as the hand-off point across context restarts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Scratch store failures.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The backing store rejected or failed the operation.
	#[error("scratch store backend failure: {0}")]
	Backend(String),
}

/// Async key-addressed store with an explicit cache-bypass read.
///
/// `get` may serve from an in-process memoization layer; `get_bypass_cache`
/// is guaranteed to read the backing store fresh. The distinction matters
/// when another context wrote the key after this one last read it.
#[async_trait]
pub trait ScratchStore: Send + Sync {
	/// Reads a value, possibly from the in-process cache.
	async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

	/// Returns whether the backing store holds the key.
	async fn has(&self, key: &str) -> Result<bool, StoreError>;

	/// Writes a value to the backing store.
	async fn save(&self, key: &str, value: Value) -> Result<(), StoreError>;

	/// Reads a value fresh from the backing store, skipping any cache.
	async fn get_bypass_cache(&self, key: &str) -> Result<Option<Value>, StoreError>;
}

/// In-memory scratch store with a shared backing map and a per-handle
/// read-through cache.
///
/// [`MemoryScratchStore::attach`] yields another context's view of the same
/// backing storage with its own (initially empty) cache layer.
#[derive(Default)]
pub struct MemoryScratchStore {
	backing: Arc<Mutex<HashMap<String, Value>>>,
	cache: Mutex<HashMap<String, Value>>,
}

impl MemoryScratchStore {
	/// Creates an empty store.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a new handle sharing this store's backing map.
	#[must_use]
	pub fn attach(&self) -> Self {
		Self {
			backing: Arc::clone(&self.backing),
			cache: Mutex::new(HashMap::new()),
		}
	}
}

#[async_trait]
impl ScratchStore for MemoryScratchStore {
	async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
		if let Some(cached) = self.cache.lock().unwrap().get(key) {
			return Ok(Some(cached.clone()));
		}
		let fresh = self.backing.lock().unwrap().get(key).cloned();
		if let Some(value) = &fresh {
			self.cache
				.lock()
				.unwrap()
				.insert(key.to_string(), value.clone());
		}
		Ok(fresh)
	}

	async fn has(&self, key: &str) -> Result<bool, StoreError> {
		Ok(self.backing.lock().unwrap().contains_key(key))
	}

	async fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
		self.backing
			.lock()
			.unwrap()
			.insert(key.to_string(), value.clone());
		self.cache.lock().unwrap().insert(key.to_string(), value);
		Ok(())
	}

	async fn get_bypass_cache(&self, key: &str) -> Result<Option<Value>, StoreError> {
		let fresh = self.backing.lock().unwrap().get(key).cloned();
		let mut cache = self.cache.lock().unwrap();
		match &fresh {
			Some(value) => {
				cache.insert(key.to_string(), value.clone());
			}
			None => {
				cache.remove(key);
			}
		}
		Ok(fresh)
	}
}

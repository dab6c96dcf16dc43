//! Shared wire types for cross-context state synchronization.
//!
//! This crate defines the messages exchanged between an authoritative
//! context and its mirrors, plus the naming scheme that binds a logical
//! channel to its transport endpoints.

#![warn(missing_docs)]

pub mod types;

pub use types::*;

/// Derives the port name an authoritative cell listens on for a channel.
#[must_use]
pub fn port_name(channel: &str) -> String {
	format!("{channel}_port")
}

/// Derives the broadcast command name for a session key's update notices.
#[must_use]
pub fn update_command(session_key: &str) -> String {
	format!("{session_key}_update")
}

/// Encodes a value into the JSON payload string carried by wire messages.
pub fn encode_payload<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
	serde_json::to_string(value)
}

/// Decodes a wire payload string back into a plain JSON tree.
///
/// Reconstruction into the rich type is the caller's business; this layer
/// only undoes the string encoding.
pub fn decode_payload(payload: &str) -> Result<serde_json::Value, serde_json::Error> {
	serde_json::from_str(payload)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn port_and_command_names_derive_from_keys() {
		assert_eq!(port_name("folders"), "folders_port");
		assert_eq!(update_command("folderService_folders"), "folderService_folders_update");
	}

	#[test]
	fn correlation_ids_are_unique_per_draw() {
		let a = CorrelationId::fresh();
		let b = CorrelationId::fresh();
		assert_ne!(a, b);
	}

	#[test]
	fn payload_round_trips_through_string_encoding() {
		let payload = encode_payload(&vec!["F1".to_string(), "F2".to_string()]).unwrap();
		let plain = decode_payload(&payload).unwrap();
		assert_eq!(plain, serde_json::json!(["F1", "F2"]));
	}

	#[test]
	fn malformed_payload_fails_to_decode() {
		assert!(decode_payload("{not json").is_err());
	}
}

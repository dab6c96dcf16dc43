//! Suppression gate for remotely-sourced re-emissions.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
	Idle,
	/// The next `n` emissions were injected from remote updates and must
	/// not be forwarded back out.
	Suppressing(u32),
}

/// Small state machine deciding which emissions the outbound forwarding
/// path may see.
///
/// `arm` is called immediately before re-injecting a remotely-sourced value
/// into the local stream; `admit` is called by the forwarding path for
/// every observed emission. Each arm suppresses exactly one emission.
#[derive(Debug)]
pub struct SuppressGate {
	state: Mutex<GateState>,
}

impl Default for SuppressGate {
	fn default() -> Self {
		Self::new()
	}
}

impl SuppressGate {
	/// Creates an idle gate.
	#[must_use]
	pub fn new() -> Self {
		Self {
			state: Mutex::new(GateState::Idle),
		}
	}

	/// Marks the next emission as remotely sourced.
	pub fn arm(&self) {
		let mut state = self.state.lock().unwrap();
		*state = match *state {
			GateState::Idle => GateState::Suppressing(1),
			GateState::Suppressing(n) => GateState::Suppressing(n + 1),
		};
	}

	/// Reports whether an observed emission passes, consuming one pending
	/// suppression if not.
	pub fn admit(&self) -> bool {
		let mut state = self.state.lock().unwrap();
		match *state {
			GateState::Idle => true,
			GateState::Suppressing(1) => {
				*state = GateState::Idle;
				false
			}
			GateState::Suppressing(n) => {
				*state = GateState::Suppressing(n - 1);
				false
			}
		}
	}

	/// Returns whether no suppression is pending.
	#[must_use]
	pub fn is_idle(&self) -> bool {
		*self.state.lock().unwrap() == GateState::Idle
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn idle_gate_admits_everything() {
		let gate = SuppressGate::new();
		assert!(gate.admit());
		assert!(gate.admit());
		assert!(gate.is_idle());
	}

	#[test]
	fn each_arm_suppresses_exactly_one_emission() {
		let gate = SuppressGate::new();
		gate.arm();
		assert!(!gate.admit());
		assert!(gate.admit());
		assert!(gate.is_idle());
	}

	#[test]
	fn stacked_arms_suppress_that_many_then_return_to_idle() {
		let gate = SuppressGate::new();
		gate.arm();
		gate.arm();
		assert!(!gate.is_idle());
		assert!(!gate.admit());
		assert!(!gate.admit());
		assert!(gate.admit());
		assert!(gate.is_idle());
	}
}

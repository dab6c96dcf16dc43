//! Minimal multi-subscriber reactive subject with explicit replay policy.
//!
//! The session syncer wraps value streams owned by other services. Those
//! streams differ in how much backlog they hand a new subscriber, so the
//! policy is explicit here and [`Subject::replay_len`] answers exactly how
//! many backlog emissions a subscriber registered right now would see.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// How much backlog a new subscriber receives before live emissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
	/// No backlog; subscribers only see emissions after they subscribe.
	None,
	/// The most recent value, if any has been emitted.
	Latest,
	/// Up to the last `n` values, oldest first.
	Buffer(usize),
}

struct SubjectState<T> {
	subscribers: Vec<mpsc::UnboundedSender<T>>,
	buffer: VecDeque<T>,
}

struct SubjectInner<T> {
	replay: Replay,
	state: Mutex<SubjectState<T>>,
}

/// Shared multi-subscriber value stream.
pub struct Subject<T> {
	inner: Arc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: Clone> Subject<T> {
	/// Creates an empty subject with the given replay policy.
	#[must_use]
	pub fn new(replay: Replay) -> Self {
		Self {
			inner: Arc::new(SubjectInner {
				replay,
				state: Mutex::new(SubjectState {
					subscribers: Vec::new(),
					buffer: VecDeque::new(),
				}),
			}),
		}
	}

	/// Creates a latest-replay subject seeded with an initial value.
	#[must_use]
	pub fn behavior(initial: T) -> Self {
		let subject = Self::new(Replay::Latest);
		subject.emit(initial);
		subject
	}

	/// Emits a value to every live subscriber and updates the backlog.
	pub fn emit(&self, value: T) {
		let mut state = self.inner.state.lock().unwrap();
		match self.inner.replay {
			Replay::None => {}
			Replay::Latest => {
				state.buffer.clear();
				state.buffer.push_back(value.clone());
			}
			Replay::Buffer(cap) => {
				if cap > 0 {
					if state.buffer.len() == cap {
						state.buffer.pop_front();
					}
					state.buffer.push_back(value.clone());
				}
			}
		}
		state.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
	}

	/// Subscribes, receiving the backlog first and live emissions after.
	pub fn subscribe(&self) -> SubjectStream<T> {
		let mut state = self.inner.state.lock().unwrap();
		let (tx, rx) = mpsc::unbounded_channel();
		for value in &state.buffer {
			let _ = tx.send(value.clone());
		}
		state.subscribers.push(tx);
		SubjectStream { rx }
	}

	/// Number of backlog emissions a subscriber registered now would see.
	#[must_use]
	pub fn replay_len(&self) -> usize {
		self.inner.state.lock().unwrap().buffer.len()
	}
}

/// One subscriber's view of a [`Subject`].
pub struct SubjectStream<T> {
	rx: mpsc::UnboundedReceiver<T>,
}

impl<T> SubjectStream<T> {
	/// Receives the next emission. `None` once the subject is gone.
	pub async fn recv(&mut self) -> Option<T> {
		self.rx.recv().await
	}
}

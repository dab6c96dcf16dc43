//! Protocol-level tests for cells and syncers over an in-process hub.

use std::sync::Arc;
use std::time::Duration;

use crosscell_proto::UpdateNotice;
use serde::Serialize;

use crate::cell::{AuthoritativeCell, AuthoritativeHandle, MirrorState, MirroredCell};
use crate::reactive::{Subject, SubjectStream};
use crate::rehydrate::Rehydrator;
use crate::scratch::ScratchStore;
use crate::syncer::{SessionSyncer, SyncerMetadata};
use crate::transport::{MessageHub, NoticeStream, Port};


/// Generous bound for waits that must complete.
pub(crate) const WAIT: Duration = Duration::from_millis(500);
/// Settle window for asserting that nothing further happens.
pub(crate) const QUIET: Duration = Duration::from_millis(50);

pub(crate) const FOLDERS_CHANNEL: &str = "folders";
pub(crate) const FOLDERS_KEY: &str = "folderService_folders";

pub(crate) fn folders(values: &[&str]) -> Vec<String> {
	values.iter().map(|v| (*v).to_string()).collect()
}

/// One authoritative cell on a fresh hub, with mirror and raw-port access.
pub(crate) struct CellHarness {
	pub hub: Arc<MessageHub>,
	pub authority: AuthoritativeHandle<Vec<String>>,
}

impl CellHarness {
	pub fn new() -> Self {
		let hub = Arc::new(MessageHub::new());
		let authority =
			AuthoritativeCell::start(&hub, FOLDERS_CHANNEL, Rehydrator::<Vec<String>>::of());
		Self { hub, authority }
	}

	pub fn mirror(&self) -> MirroredCell<Vec<String>> {
		MirroredCell::connect(&self.hub, FOLDERS_CHANNEL, Rehydrator::of())
			.expect("authoritative listener is registered")
	}

	/// A bare port speaking the wire protocol directly, for driving frames
	/// a well-behaved mirror would never send.
	pub fn raw_port(&self) -> Port {
		self.hub
			.connect(&crosscell_proto::port_name(FOLDERS_CHANNEL))
			.expect("authoritative listener is registered")
	}
}

pub(crate) async fn wait_mirror<T, F>(cell: &MirroredCell<T>, predicate: F) -> MirrorState<T>
where
	T: Clone + Serialize + Send + Sync + 'static,
	F: FnMut(&MirrorState<T>) -> bool,
{
	let mut rx = cell.subscribe();
	let state = tokio::time::timeout(WAIT, rx.wait_for(predicate))
		.await
		.expect("mirror did not reach the expected state in time")
		.expect("mirror state channel closed");
	state.clone()
}

pub(crate) async fn wait_mirror_value(cell: &MirroredCell<Vec<String>>, expected: &[&str]) {
	let expected = folders(expected);
	wait_mirror(cell, |state| state.value.as_ref() == Some(&expected)).await;
}

pub(crate) async fn wait_connected_ports(
	authority: &AuthoritativeHandle<Vec<String>>,
	expected: usize,
) {
	let deadline = tokio::time::Instant::now() + WAIT;
	loop {
		if authority.connected_ports().await == expected {
			return;
		}
		assert!(
			tokio::time::Instant::now() < deadline,
			"port registration count did not reach {expected}"
		);
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
}

pub(crate) async fn next_value<T>(stream: &mut SubjectStream<T>) -> T {
	tokio::time::timeout(WAIT, stream.recv())
		.await
		.expect("emission did not arrive in time")
		.expect("subject dropped")
}

pub(crate) async fn next_notice(stream: &mut NoticeStream) -> UpdateNotice {
	tokio::time::timeout(WAIT, stream.recv())
		.await
		.expect("notice did not arrive in time")
		.expect("hub dropped")
}

pub(crate) async fn expect_no_notice(stream: &mut NoticeStream) {
	assert!(
		tokio::time::timeout(QUIET, stream.recv()).await.is_err(),
		"unexpected broadcast"
	);
}

pub(crate) fn folders_syncer(
	hub: &Arc<MessageHub>,
	subject: &Subject<Vec<String>>,
	store: Arc<dyn ScratchStore>,
) -> SessionSyncer<Vec<String>> {
	SessionSyncer::new(
		Arc::clone(hub),
		subject.clone(),
		store,
		SyncerMetadata::with_initializer(FOLDERS_KEY, Rehydrator::of()),
	)
	.expect("initializer supplied")
}

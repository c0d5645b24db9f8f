//! Per-document FIFO sequencing.
//!
//! Readiness waits make every handler a suspension point, so two events for
//! the same document could otherwise race to the instance's inbound channel
//! in the wrong order. The sequencer restores the editor's emission order:
//! a [`Turn`] is claimed synchronously (position = claim order) and
//! [`Turn::wait`] suspends until every earlier turn for the same document
//! has been released.
//!
//! Dropping a turn releases it, whether or not it was ever waited on. That
//! way suppressed no-op branches and cancelled handlers cannot wedge the
//! queue behind them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lsp_types::Uri;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Hands out per-document turns. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct DocumentSequencer {
	inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
	/// Live queues keyed by document URI. Entries are dropped once the
	/// last outstanding turn is released.
	queues: Mutex<HashMap<String, Arc<DocQueue>>>,
}

#[derive(Debug)]
struct DocQueue {
	state: Mutex<QueueState>,
	/// Highest ticket whose predecessors have all been released.
	served_tx: watch::Sender<u64>,
}

#[derive(Debug)]
struct QueueState {
	/// Next ticket to hand out.
	next_ticket: u64,
	/// Tickets released out of order, waiting for their predecessors.
	released: HashSet<u64>,
}

impl DocQueue {
	fn new() -> Self {
		let (served_tx, _) = watch::channel(0);
		Self {
			state: Mutex::new(QueueState {
				next_ticket: 0,
				released: HashSet::new(),
			}),
			served_tx,
		}
	}
}

impl DocumentSequencer {
	/// Create an empty sequencer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Claim the next turn for `uri`.
	///
	/// The position in the document's queue is fixed here, synchronously,
	/// not when the turn is first awaited.
	pub fn enqueue(&self, uri: &Uri) -> Turn {
		let key = uri.as_str().to_owned();
		// The ticket is allocated while the map guard is still held.
		// Otherwise a concurrent release could judge the queue drained
		// between the lookup and the bump, remove it, and leave this turn
		// on an orphaned queue no successor would ever wait for.
		let mut queues = self.inner.queues.lock();
		let queue = queues
			.entry(key.clone())
			.or_insert_with(|| Arc::new(DocQueue::new()))
			.clone();
		let ticket = {
			let mut state = queue.state.lock();
			let ticket = state.next_ticket;
			state.next_ticket += 1;
			ticket
		};
		drop(queues);
		Turn {
			inner: self.inner.clone(),
			key,
			queue,
			ticket,
		}
	}

	/// Number of documents with outstanding turns.
	pub fn pending_documents(&self) -> usize {
		self.inner.queues.lock().len()
	}
}

/// A claimed position in a document's forwarding queue.
///
/// Dropping the turn releases it.
pub struct Turn {
	inner: Arc<Inner>,
	key: String,
	queue: Arc<DocQueue>,
	ticket: u64,
}

impl std::fmt::Debug for Turn {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Turn")
			.field("document", &self.key)
			.field("ticket", &self.ticket)
			.finish()
	}
}

impl Turn {
	/// Suspend until all earlier turns for this document are released.
	pub async fn wait(&self) {
		let mut served_rx = self.queue.served_tx.subscribe();
		// Cannot fail: the queue (and its sender) outlives this turn.
		let _ = served_rx.wait_for(|served| *served >= self.ticket).await;
	}
}

impl Drop for Turn {
	fn drop(&mut self) {
		let mut state = self.queue.state.lock();
		state.released.insert(self.ticket);
		// Advance past every consecutively released ticket so waiters
		// behind an out-of-order release still run in order.
		self.queue.served_tx.send_modify(|served| {
			while state.released.remove(served) {
				*served += 1;
			}
		});
		let drained = *self.queue.served_tx.borrow() == state.next_ticket;
		drop(state);
		if drained {
			let mut queues = self.inner.queues.lock();
			let still_drained = queues.get(&self.key).is_some_and(|queue| {
				Arc::ptr_eq(queue, &self.queue)
					&& *queue.served_tx.borrow() == queue.state.lock().next_ticket
			});
			if still_drained {
				queues.remove(&self.key);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn uri(s: &str) -> Uri {
		s.parse().unwrap()
	}

	#[tokio::test]
	async fn test_turns_serve_in_claim_order() {
		let sequencer = DocumentSequencer::new();
		let u = uri("file:///ws/a.c");
		let order = Arc::new(Mutex::new(Vec::new()));

		let turns: Vec<Turn> = (0..3).map(|_| sequencer.enqueue(&u)).collect();

		// Spawn in reverse to show ticket order, not poll order, governs.
		let mut handles = Vec::new();
		for (i, turn) in turns.into_iter().enumerate().rev() {
			let order = order.clone();
			handles.push(tokio::spawn(async move {
				turn.wait().await;
				order.lock().push(i);
			}));
		}
		for handle in handles {
			handle.await.unwrap();
		}

		assert_eq!(*order.lock(), vec![0, 1, 2]);
	}

	#[tokio::test]
	async fn test_dropped_turn_releases_its_slot() {
		let sequencer = DocumentSequencer::new();
		let u = uri("file:///ws/a.c");

		let first = sequencer.enqueue(&u);
		let second = sequencer.enqueue(&u);
		let third = sequencer.enqueue(&u);

		// A turn abandoned before its slot comes up must not block later
		// turns once its predecessors finish.
		drop(second);
		first.wait().await;
		drop(first);
		third.wait().await;
		drop(third);

		assert_eq!(sequencer.pending_documents(), 0);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_enqueue_racing_drain_keeps_fifo() {
		use std::sync::atomic::{AtomicBool, Ordering};
		use std::time::Duration;

		let sequencer = DocumentSequencer::new();
		let u = uri("file:///ws/a.c");

		// The last outstanding turn is released on another thread while two
		// new turns are claimed. The second claim must queue behind the
		// first even if the release drains and removes the queue mid-claim.
		for _ in 0..100 {
			let settled = sequencer.enqueue(&u);
			let release = tokio::task::spawn_blocking(move || drop(settled));
			let first = sequencer.enqueue(&u);
			let second = sequencer.enqueue(&u);
			release.await.unwrap();

			let reached = Arc::new(AtomicBool::new(false));
			let observed = reached.clone();
			let waiter = tokio::spawn(async move {
				second.wait().await;
				observed.store(true, Ordering::SeqCst);
			});
			tokio::time::sleep(Duration::from_millis(1)).await;
			assert!(
				!reached.load(Ordering::SeqCst),
				"second turn ran before the first was released"
			);
			drop(first);
			waiter.await.unwrap();
		}
	}

	#[tokio::test]
	async fn test_documents_are_independent() {
		let sequencer = DocumentSequencer::new();
		let blocked = sequencer.enqueue(&uri("file:///ws/a.c"));
		let _still_queued = sequencer.enqueue(&uri("file:///ws/a.c"));

		// Another document's turn is immediately serviceable.
		let other = sequencer.enqueue(&uri("file:///ws/b.c"));
		other.wait().await;

		drop(blocked);
	}
}

//! Instance readiness signaling.
//!
//! Every forwarded operation (with one deliberate exception, see
//! [`crate::intercept`]) waits on the owning instance's readiness signal
//! first. The signal is monotonic: it moves from [`InstanceState::Starting`]
//! to [`InstanceState::Ready`] exactly once and never regresses, so waiters
//! that arrive after the transition complete immediately.

use tokio::sync::watch;

/// Instance lifecycle state as seen by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
	/// Instance spawned, initialization in progress.
	Starting,
	/// Initialization complete, ready for traffic.
	Ready,
}

/// One-way readiness barrier built on a watch channel.
///
/// Cheap to clone; all clones observe the same signal.
#[derive(Debug, Clone)]
pub struct ReadinessSignal {
	state_tx: watch::Sender<InstanceState>,
}

impl Default for ReadinessSignal {
	fn default() -> Self {
		Self::new()
	}
}

impl ReadinessSignal {
	/// Create a signal in the [`InstanceState::Starting`] state.
	pub fn new() -> Self {
		let (state_tx, _) = watch::channel(InstanceState::Starting);
		Self { state_tx }
	}

	/// Current state (non-blocking).
	pub fn state(&self) -> InstanceState {
		*self.state_tx.borrow()
	}

	/// Whether the instance has become ready.
	pub fn is_ready(&self) -> bool {
		self.state() == InstanceState::Ready
	}

	/// Fire the readiness signal. Idempotent; there is no way back to
	/// [`InstanceState::Starting`].
	pub fn set_ready(&self) {
		self.state_tx.send_if_modified(|state| {
			let changed = *state != InstanceState::Ready;
			*state = InstanceState::Ready;
			changed
		});
	}

	/// Suspend until the signal has fired at least once.
	///
	/// Resolves immediately if the instance is already ready. There is no
	/// timeout at this layer: if readiness never fires, the wait stays
	/// pending until the holder is torn down.
	pub async fn wait_ready(&self) {
		let mut state_rx = self.state_tx.subscribe();
		// Cannot fail: we hold the sender for as long as we wait.
		let _ = state_rx
			.wait_for(|state| *state == InstanceState::Ready)
			.await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_wait_ready_resolves_after_signal() {
		let signal = ReadinessSignal::new();
		assert!(!signal.is_ready());

		let waiter = signal.clone();
		let handle = tokio::spawn(async move { waiter.wait_ready().await });

		signal.set_ready();
		handle.await.unwrap();
		assert!(signal.is_ready());
	}

	#[tokio::test]
	async fn test_wait_ready_is_idempotent() {
		let signal = ReadinessSignal::new();
		signal.set_ready();
		signal.set_ready();

		// Must not re-suspend once ready.
		signal.wait_ready().await;
		signal.wait_ready().await;
		assert_eq!(signal.state(), InstanceState::Ready);
	}
}

//! Handle to a language server instance.
//!
//! The instance's process, transport, and wire protocol live outside this
//! crate. What this crate sees is an [`InstanceHandle`]: a readiness
//! signal, a FIFO inbound channel events are forwarded into, a
//! filename→language association map, and the [`InstanceHooks`]
//! collaborator the interceptor invokes around forwarded events.
//!
//! Enqueuing onto the inbound channel is synchronous, so channel order is
//! caller order; the external transport drains the [`Inbound`] receiver and
//! owns all delivery failures past that point.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::Uri;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::document::Document;
use crate::event::{DidChange, Event};
use crate::gate::{InstanceState, ReadinessSignal};
use crate::{Error, Result};

/// Unique identifier for a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

/// An event handed off to an instance's inbound channel.
#[derive(Debug)]
pub enum Inbound {
	/// Fire-and-forget notification.
	Notification(Event),
	/// Request expecting a reply.
	Request {
		/// The forwarded request event.
		event: Event,
		/// Channel the transport replies on.
		reply: oneshot::Sender<JsonValue>,
	},
}

/// Callbacks a service instance exposes to the interceptor.
///
/// All methods default to no-ops so collaborators only implement what they
/// care about.
#[async_trait]
pub trait InstanceHooks: Send + Sync {
	/// Called before the open payload is forwarded, letting the instance
	/// push document-specific configuration first.
	async fn provide_custom_configuration(&self, _uri: &Uri) {}

	/// Called after an open was forwarded.
	fn on_did_open(&self, _document: &Document) {}

	/// Called before a change is forwarded (updates instance-local buffer
	/// state).
	fn on_did_change(&self, _change: &DidChange) {}

	/// Called before a close is forwarded.
	fn on_did_close(&self, _document: &Document) {}

	/// The instance's settings view must be refreshed (an association
	/// changed).
	fn on_settings_changed(&self) {}
}

/// Hooks implementation that ignores all callbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHooks;

#[async_trait]
impl InstanceHooks for NoOpHooks {}

/// Handle to one language server instance.
///
/// Cheap to clone; all clones refer to the same instance.
#[derive(Clone)]
pub struct InstanceHandle {
	/// Unique identifier.
	id: InstanceId,
	/// Human-readable name (usually the server command).
	name: String,
	/// Readiness barrier.
	readiness: ReadinessSignal,
	/// Inbound event queue drained by the external transport.
	inbound_tx: mpsc::UnboundedSender<Inbound>,
	/// Collaborator hooks.
	hooks: Arc<dyn InstanceHooks>,
	/// Filename→language associations this instance has been told about.
	associations: Arc<RwLock<HashMap<String, String>>>,
}

impl std::fmt::Debug for InstanceHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstanceHandle")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

impl InstanceHandle {
	/// Create a handle and the inbound receiver its transport drains.
	pub fn new(
		id: InstanceId,
		name: impl Into<String>,
		hooks: Arc<dyn InstanceHooks>,
	) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let handle = Self {
			id,
			name: name.into(),
			readiness: ReadinessSignal::new(),
			inbound_tx,
			hooks,
			associations: Arc::new(RwLock::new(HashMap::new())),
		};
		(handle, inbound_rx)
	}

	/// The instance's unique identifier.
	pub fn id(&self) -> InstanceId {
		self.id
	}

	/// The instance's name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Current lifecycle state (non-blocking).
	pub fn state(&self) -> InstanceState {
		self.readiness.state()
	}

	/// Whether the instance is ready for traffic.
	pub fn is_ready(&self) -> bool {
		self.readiness.is_ready()
	}

	/// Mark the instance ready. Idempotent.
	pub fn set_ready(&self) {
		self.readiness.set_ready();
	}

	/// Suspend until the instance is ready. See
	/// [`ReadinessSignal::wait_ready`].
	pub async fn wait_ready(&self) {
		self.readiness.wait_ready().await;
	}

	/// Enqueue a notification onto the inbound channel.
	pub fn forward_notification(&self, event: Event) -> Result<()> {
		debug!(
			instance = self.id.0,
			method = event.method(),
			uri = event.uri().map(|uri| uri.as_str()),
			"forward"
		);
		self.inbound_tx
			.send(Inbound::Notification(event))
			.map_err(|_| Error::ServiceStopped)
	}

	/// Enqueue a request and await the transport's reply.
	pub async fn forward_request(&self, event: Event) -> Result<JsonValue> {
		debug!(
			instance = self.id.0,
			method = event.method(),
			uri = event.uri().map(|uri| uri.as_str()),
			"forward request"
		);
		let (reply, reply_rx) = oneshot::channel();
		self.inbound_tx
			.send(Inbound::Request { event, reply })
			.map_err(|_| Error::ServiceStopped)?;
		reply_rx.await.map_err(|_| Error::ServiceStopped)
	}

	/// Record a filename→language association.
	pub fn add_file_association(&self, key: impl Into<String>, language: impl Into<String>) {
		let key = key.into();
		let language = language.into();
		debug!(instance = self.id.0, key = %key, language = %language, "file association");
		self.associations.write().insert(key, language);
	}

	/// Look up a previously recorded association.
	pub fn file_association(&self, key: &str) -> Option<String> {
		self.associations.read().get(key).cloned()
	}

	/// Tell the instance its settings view must be refreshed.
	pub fn notify_settings_changed(&self) {
		self.hooks.on_settings_changed();
	}

	/// Let the instance push document-specific configuration.
	pub async fn provide_custom_configuration(&self, uri: &Uri) {
		self.hooks.provide_custom_configuration(uri).await;
	}

	/// Post-open hook.
	pub fn on_did_open(&self, document: &Document) {
		self.hooks.on_did_open(document);
	}

	/// Pre-change hook.
	pub fn on_did_change(&self, change: &DidChange) {
		self.hooks.on_did_change(change);
	}

	/// Pre-close hook.
	pub fn on_did_close(&self, document: &Document) {
		self.hooks.on_did_close(document);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_inbound_preserves_enqueue_order() {
		let (handle, mut inbound) = InstanceHandle::new(InstanceId(1), "clangd", Arc::new(NoOpHooks));
		let doc = Document::from_path("/ws/a.c", "c").unwrap();

		handle
			.forward_notification(Event::DidOpen {
				document: doc.clone(),
				text: String::new(),
			})
			.unwrap();
		handle
			.forward_notification(Event::DidClose { document: doc })
			.unwrap();

		assert!(matches!(
			inbound.recv().await.unwrap(),
			Inbound::Notification(Event::DidOpen { .. })
		));
		assert!(matches!(
			inbound.recv().await.unwrap(),
			Inbound::Notification(Event::DidClose { .. })
		));
	}

	#[tokio::test]
	async fn test_forward_after_transport_gone_is_service_stopped() {
		let (handle, inbound) = InstanceHandle::new(InstanceId(1), "clangd", Arc::new(NoOpHooks));
		drop(inbound);

		let doc = Document::from_path("/ws/a.c", "c").unwrap();
		let err = handle
			.forward_notification(Event::DidClose { document: doc })
			.unwrap_err();
		assert!(matches!(err, Error::ServiceStopped));
	}

	#[test]
	fn test_file_associations() {
		let (handle, _inbound) = InstanceHandle::new(InstanceId(1), "clangd", Arc::new(NoOpHooks));
		handle.add_file_association("util.h@/ws/util.h", "cpp");
		assert_eq!(
			handle.file_association("util.h@/ws/util.h").as_deref(),
			Some("cpp")
		);
		assert_eq!(handle.file_association("other.h@/ws/other.h"), None);
	}
}

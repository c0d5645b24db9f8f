//! The protocol interceptor façade.
//!
//! Every editor-host event enters through [`ProtocolInterceptor`], which
//! applies ownership routing, the readiness gate, tracking checks, and the
//! reclassification policy before (or instead of) forwarding the event to
//! the owning instance's inbound channel.
//!
//! # Ordering
//!
//! Lifecycle handlers (`did_open`, `did_change`, `will_save`, `did_save`,
//! `did_close`) claim their per-document turn synchronously, before
//! returning their future. Per-document forwarding order therefore equals
//! the order the host called the handlers in, no matter how long each one
//! sits behind the readiness gate. `will_save_wait_until` is the deliberate
//! exception: it has a latency budget a pending startup could blow, so it
//! skips both the gate and the queue and relies on the tracking check
//! alone.
//!
//! # Tracking-state discipline
//!
//! `mark`/`unmark` happen only after the corresponding forward succeeded.
//! If the forward fails the registry still agrees with the instance's real
//! state, which is the one property this layer must never give up.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lsp_types::TextEdit;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::Result;
use crate::document::{Document, DocumentRegistry};
use crate::event::{DidChange, DidSave, DocRequest, Event, RequestKind, WillSave};
use crate::host::{EditorHost, Telemetry};
use crate::reclassify::ReclassificationPolicy;
use crate::router::OwnershipRouter;
use crate::sequence::{DocumentSequencer, Turn};

/// Outcome of an intercepted event.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
	/// Notification handled; nothing to return.
	None,
	/// Edits from a will-save-wait-until round trip.
	Edits(Vec<TextEdit>),
	/// Raw reply of a read-only request, passed through unchanged.
	Value(JsonValue),
}

/// Intercepts every editor-host event bound for a language server.
///
/// Cheap to clone; all collaborators are injected at construction.
#[derive(Clone)]
pub struct ProtocolInterceptor {
	router: Arc<OwnershipRouter>,
	registry: Arc<DocumentRegistry>,
	policy: ReclassificationPolicy,
	host: Arc<dyn EditorHost>,
	telemetry: Arc<dyn Telemetry>,
	sequencer: DocumentSequencer,
}

impl std::fmt::Debug for ProtocolInterceptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProtocolInterceptor")
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}

impl ProtocolInterceptor {
	/// Create an interceptor over an ownership router and its collaborators.
	pub fn new(
		router: Arc<OwnershipRouter>,
		policy: ReclassificationPolicy,
		host: Arc<dyn EditorHost>,
		telemetry: Arc<dyn Telemetry>,
	) -> Self {
		let registry = router.registry().clone();
		Self {
			router,
			registry,
			policy,
			host,
			telemetry,
			sequencer: DocumentSequencer::new(),
		}
	}

	/// Handle any intercepted event.
	///
	/// Exhaustive dispatch to the typed handlers below. Lifecycle events
	/// claim their per-document turn here, before the future is returned,
	/// so spawning these futures in any order still forwards in call
	/// order.
	pub fn intercept(&self, event: Event) -> impl Future<Output = Result<Response>> + Send + 'static {
		let inner: Pin<Box<dyn Future<Output = Result<Response>> + Send>> = match event {
			Event::DidOpen { document, text } => {
				let open = self.did_open(document, text);
				Box::pin(async move { open.await.map(|()| Response::None) })
			}
			Event::DidChange(change) => {
				let change = self.did_change(change);
				Box::pin(async move { change.await.map(|()| Response::None) })
			}
			Event::WillSave(event) => {
				let save = self.will_save(event);
				Box::pin(async move { save.await.map(|()| Response::None) })
			}
			Event::WillSaveWaitUntil(event) => {
				let this = self.clone();
				Box::pin(async move {
					Ok(Response::Edits(this.will_save_wait_until(event).await?))
				})
			}
			Event::DidSave(event) => {
				let save = self.did_save(event);
				Box::pin(async move { save.await.map(|()| Response::None) })
			}
			Event::DidClose { document } => {
				let close = self.did_close(document);
				Box::pin(async move { close.await.map(|()| Response::None) })
			}
			Event::DidChangeConfiguration { settings } => {
				let this = self.clone();
				Box::pin(async move {
					this.did_change_configuration(settings)
						.await
						.map(|()| Response::None)
				})
			}
			Event::Request(request) => {
				let this = self.clone();
				Box::pin(async move { this.request(request).await.map(Response::Value) })
			}
		};
		inner
	}

	/// A document was opened in the editor.
	///
	/// Forwarded only if the document is visible in some view and this is
	/// its first accepted open; an open for an invisible document (e.g.
	/// triggered by a peek widget) is deferred until the visibility path
	/// replays it.
	pub fn did_open(
		&self,
		document: Document,
		text: String,
	) -> impl Future<Output = Result<()>> + Send + 'static {
		let turn = self.sequencer.enqueue(document.uri());
		let this = self.clone();
		async move { this.open_in_turn(document, text, turn).await }
	}

	async fn open_in_turn(&self, document: Document, text: String, turn: Turn) -> Result<()> {
		turn.wait().await;
		let Some(instance) = self.router.resolve(&document) else {
			debug!(uri = document.uri().as_str(), "no instance yet, open deferred");
			return Ok(());
		};
		instance.wait_ready().await;

		if !self.host.is_visible(document.uri()) {
			// Not in any editor view. Deliberate no-op: the visibility
			// notification replays the open when the document first
			// becomes visible.
			debug!(uri = document.uri().as_str(), "open for invisible document deferred");
			return Ok(());
		}
		if !self.router.claim(&instance, &document) {
			return Ok(());
		}

		self.telemetry.record_first_open(document.uri());
		let document = self
			.policy
			.apply(self.host.as_ref(), &instance, document, &text)
			.await;

		instance.provide_custom_configuration(document.uri()).await;
		instance.forward_notification(Event::DidOpen {
			document: document.clone(),
			text,
		})?;
		self.registry.mark(instance.id(), document.uri());
		instance.on_did_open(&document);

		if self.host.is_active(document.uri()) {
			self.host.on_active_view_changed(document.uri());
		}
		Ok(())
	}

	/// A document's content changed.
	pub fn did_change(&self, change: DidChange) -> impl Future<Output = Result<()>> + Send + 'static {
		let turn = self.sequencer.enqueue(change.document.uri());
		let this = self.clone();
		async move {
			turn.wait().await;
			let Some(instance) = this.router.resolve(&change.document) else {
				return Ok(());
			};
			instance.wait_ready().await;
			instance.on_did_change(&change);
			instance.forward_notification(Event::DidChange(change))
		}
	}

	/// A document is about to be saved.
	pub fn will_save(&self, event: WillSave) -> impl Future<Output = Result<()>> + Send + 'static {
		let turn = self.sequencer.enqueue(event.document.uri());
		let this = self.clone();
		async move {
			turn.wait().await;
			let Some(instance) = this.router.resolve(&event.document) else {
				return Ok(());
			};
			instance.wait_ready().await;
			instance.forward_notification(Event::WillSave(event))
		}
	}

	/// A document is about to be saved and the instance may reply with
	/// edits to apply first.
	///
	/// Never waits on readiness or the per-document queue; an untracked
	/// document yields an empty edit list immediately.
	pub async fn will_save_wait_until(&self, event: WillSave) -> Result<Vec<TextEdit>> {
		let Some(instance) = self.router.resolve(&event.document) else {
			return Ok(Vec::new());
		};
		if !self.registry.is_tracked(instance.id(), event.document.uri()) {
			return Ok(Vec::new());
		}
		let reply = instance
			.forward_request(Event::WillSaveWaitUntil(event))
			.await?;
		if reply.is_null() {
			return Ok(Vec::new());
		}
		Ok(serde_json::from_value(reply)?)
	}

	/// A document was saved.
	pub fn did_save(&self, event: DidSave) -> impl Future<Output = Result<()>> + Send + 'static {
		let turn = self.sequencer.enqueue(event.document.uri());
		let this = self.clone();
		async move {
			turn.wait().await;
			let Some(instance) = this.router.resolve(&event.document) else {
				return Ok(());
			};
			instance.wait_ready().await;
			instance.forward_notification(Event::DidSave(event))
		}
	}

	/// A document was closed.
	///
	/// Untracked documents are a silent no-op; forwarding a close the
	/// instance never saw an open for would desynchronize its model.
	pub fn did_close(&self, document: Document) -> impl Future<Output = Result<()>> + Send + 'static {
		let turn = self.sequencer.enqueue(document.uri());
		let this = self.clone();
		async move {
			turn.wait().await;
			let Some(instance) = this.router.resolve(&document) else {
				return Ok(());
			};
			instance.wait_ready().await;
			if !this.registry.is_tracked(instance.id(), document.uri()) {
				debug!(uri = document.uri().as_str(), "close for untracked document suppressed");
				return Ok(());
			}
			instance.on_did_close(&document);
			let uri = document.uri().clone();
			instance.forward_notification(Event::DidClose { document })?;
			this.registry.unmark(instance.id(), &uri);
			Ok(())
		}
	}

	/// Instance-scoped configuration change; routed to the active
	/// instance.
	pub async fn did_change_configuration(&self, settings: JsonValue) -> Result<()> {
		let Some(instance) = self.router.active_instance() else {
			return Ok(());
		};
		instance.wait_ready().await;
		instance.forward_notification(Event::DidChangeConfiguration { settings })
	}

	/// A read-only request.
	///
	/// All kinds gate on readiness. Hover additionally requires the
	/// document to be tracked: it is routinely invoked on documents never
	/// opened in a view, and forwarding it would imply an open the
	/// instance never saw. The other kinds forward unconditionally once
	/// ready.
	pub async fn request(&self, request: DocRequest) -> Result<JsonValue> {
		let Some(instance) = self.router.resolve(&request.document) else {
			return Ok(JsonValue::Null);
		};
		instance.wait_ready().await;
		if request.kind == RequestKind::Hover
			&& !self.registry.is_tracked(instance.id(), request.document.uri())
		{
			return Ok(JsonValue::Null);
		}
		instance.forward_request(Event::Request(request)).await
	}

	/// The set of visible documents changed.
	///
	/// Replays the open path for each now-visible document. Idempotent:
	/// already-tracked documents fail the claim and are skipped, so the
	/// host may report the full visible set every time.
	pub async fn did_change_visible_documents(
		&self,
		documents: Vec<(Document, String)>,
	) -> Result<()> {
		for (document, text) in documents {
			self.did_open(document, text).await?;
		}
		Ok(())
	}
}

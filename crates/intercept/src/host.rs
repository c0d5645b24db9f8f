//! Editor-host collaborators.
//!
//! The interceptor needs three things from the editor it never owns: which
//! documents are visible, which one is active, and the ability to relabel a
//! document's language. Telemetry is a separate fire-and-forget seam.

use async_trait::async_trait;
use lsp_types::Uri;

use crate::document::Document;

/// View state and document control surface of the editor host.
#[async_trait]
pub trait EditorHost: Send + Sync {
	/// Whether the document is currently visible in some editor view.
	fn is_visible(&self, uri: &Uri) -> bool;

	/// Whether the document is in the currently active view.
	fn is_active(&self, uri: &Uri) -> bool;

	/// Relabel the document's declared language, returning the relabeled
	/// document the rest of the open sequence proceeds with.
	async fn set_document_language(&self, document: &Document, language_id: &str) -> Document;

	/// Notification hook fired when an intercepted open lands on the
	/// active view.
	fn on_active_view_changed(&self, _uri: &Uri) {}
}

/// Fire-and-forget telemetry sink.
pub trait Telemetry: Send + Sync {
	/// Record the timestamp of a document's first accepted open.
	fn record_first_open(&self, uri: &Uri);
}

/// Telemetry sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTelemetry;

impl Telemetry for NoOpTelemetry {
	fn record_first_open(&self, _uri: &Uri) {}
}

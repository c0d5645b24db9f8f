//! The closed set of editor-host events this crate intercepts.
//!
//! Each variant carries its own typed payload and is dispatched by
//! exhaustive match in [`crate::intercept::ProtocolInterceptor::intercept`].
//! Read-only requests share one shape ([`DocRequest`]) because the
//! interceptor only decides whether to forward them; it never inspects the
//! request parameters.

use lsp_types::{TextDocumentContentChangeEvent, TextDocumentSaveReason, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::document::Document;

/// Payload of a document change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidChange {
	/// The changed document.
	pub document: Document,
	/// Version after the change.
	pub version: i32,
	/// Content deltas, in application order.
	pub changes: Vec<TextDocumentContentChangeEvent>,
}

/// Payload of the will-save family of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WillSave {
	/// The document about to be saved.
	pub document: Document,
	/// Why the save is happening.
	pub reason: TextDocumentSaveReason,
}

/// Payload of a save notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidSave {
	/// The saved document.
	pub document: Document,
	/// Saved content, if the server asked for it.
	pub text: Option<String>,
}

/// Read-only request kinds the interceptor gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
	/// `textDocument/completion`.
	Completion,
	/// `completionItem/resolve`.
	ResolveCompletion,
	/// `textDocument/hover`.
	Hover,
	/// `textDocument/signatureHelp`.
	SignatureHelp,
	/// `textDocument/definition`.
	Definition,
	/// `textDocument/references`.
	References,
	/// `textDocument/documentHighlight`.
	DocumentHighlights,
	/// `textDocument/declaration`.
	Declaration,
}

impl RequestKind {
	/// The LSP method name for this request kind.
	pub fn method(self) -> &'static str {
		match self {
			Self::Completion => "textDocument/completion",
			Self::ResolveCompletion => "completionItem/resolve",
			Self::Hover => "textDocument/hover",
			Self::SignatureHelp => "textDocument/signatureHelp",
			Self::Definition => "textDocument/definition",
			Self::References => "textDocument/references",
			Self::DocumentHighlights => "textDocument/documentHighlight",
			Self::Declaration => "textDocument/declaration",
		}
	}
}

/// A read-only request targeting a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRequest {
	/// Which request this is.
	pub kind: RequestKind,
	/// The document the request is about.
	pub document: Document,
	/// Raw request parameters, passed through untouched.
	pub params: JsonValue,
}

/// An intercepted editor-host event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
	/// A document was opened in the editor.
	DidOpen {
		/// The opened document.
		document: Document,
		/// Full document content.
		text: String,
	},
	/// A document's content changed.
	DidChange(DidChange),
	/// A document is about to be saved.
	WillSave(WillSave),
	/// A document is about to be saved and the server may reply with edits.
	WillSaveWaitUntil(WillSave),
	/// A document was saved.
	DidSave(DidSave),
	/// A document was closed.
	DidClose {
		/// The closed document.
		document: Document,
	},
	/// Instance-scoped configuration change; carries no document identity.
	DidChangeConfiguration {
		/// New settings view.
		settings: JsonValue,
	},
	/// A read-only request.
	Request(DocRequest),
}

impl Event {
	/// The document URI this event concerns, if any.
	pub fn uri(&self) -> Option<&Uri> {
		match self {
			Self::DidOpen { document, .. } | Self::DidClose { document } => Some(document.uri()),
			Self::DidChange(ev) => Some(ev.document.uri()),
			Self::WillSave(ev) | Self::WillSaveWaitUntil(ev) => Some(ev.document.uri()),
			Self::DidSave(ev) => Some(ev.document.uri()),
			Self::Request(req) => Some(req.document.uri()),
			Self::DidChangeConfiguration { .. } => None,
		}
	}

	/// The LSP method name for this event, for logging.
	pub fn method(&self) -> &'static str {
		match self {
			Self::DidOpen { .. } => "textDocument/didOpen",
			Self::DidChange(_) => "textDocument/didChange",
			Self::WillSave(_) => "textDocument/willSave",
			Self::WillSaveWaitUntil(_) => "textDocument/willSaveWaitUntil",
			Self::DidSave(_) => "textDocument/didSave",
			Self::DidClose { .. } => "textDocument/didClose",
			Self::DidChangeConfiguration { .. } => "workspace/didChangeConfiguration",
			Self::Request(req) => req.kind.method(),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_uri_present_for_document_events_only() {
		let document = Document::from_path("/ws/a.c", "c").unwrap();
		let open = Event::DidOpen {
			document: document.clone(),
			text: String::new(),
		};
		assert_eq!(open.uri(), Some(document.uri()));
		assert_eq!(open.method(), "textDocument/didOpen");

		let config = Event::DidChangeConfiguration {
			settings: json!({}),
		};
		assert_eq!(config.uri(), None);
	}
}

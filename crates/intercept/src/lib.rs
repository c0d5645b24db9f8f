//! Protocol interception and readiness gating between the editor and
//! language servers.
//!
//! Every document-lifecycle notification and read-only request the editor
//! wants to send to a language server passes through the
//! [`ProtocolInterceptor`]. The interceptor decides *whether*, *when*, and
//! *to which* server instance the event is delivered:
//!
//! - [`router::OwnershipRouter`]: each document belongs to exactly one
//!   server instance (usually one per workspace root). Events for documents
//!   no instance owns yet are deferred, never sent to a fallback.
//! - [`gate::ReadinessSignal`]: no event reaches an instance before it has
//!   finished initializing. Readiness is monotonic; once an instance is
//!   ready, the gate never suspends again.
//! - [`document::DocumentRegistry`]: the single owner of the "which
//!   documents does this instance consider open" relation. Stray events for
//!   untracked documents are suppressed instead of desynchronizing the
//!   server's model.
//! - [`reclassify::ReclassificationPolicy`]: a one-shot language relabel on
//!   first open, driven by a content heuristic supplied by the editor.
//! - [`sequence::DocumentSequencer`]: per-document FIFO ordering, so a
//!   readiness wait can never reorder events for the same document.
//!
//! The wire protocol, server process lifecycle, and request payload
//! semantics all live outside this crate; they are reached through the
//! collaborator traits in [`host`] and [`instance`].
#![warn(missing_docs)]

use std::path::Path;

use lsp_types::Uri;

pub mod document;
pub mod event;
pub mod gate;
pub mod host;
pub mod instance;
pub mod intercept;
pub mod reclassify;
pub mod router;
pub mod sequence;

pub use document::{Document, DocumentRegistry};
pub use event::{DidChange, DidSave, DocRequest, Event, RequestKind, WillSave};
pub use gate::{InstanceState, ReadinessSignal};
pub use host::{EditorHost, NoOpTelemetry, Telemetry};
pub use instance::{Inbound, InstanceHandle, InstanceHooks, InstanceId, NoOpHooks};
pub use intercept::{ProtocolInterceptor, Response};
pub use reclassify::{ReclassificationPolicy, ReclassifyHeuristic, ReclassifyRule};
pub use router::OwnershipRouter;
pub use sequence::DocumentSequencer;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
///
/// The taxonomy is intentionally thin: unresolved ownership and events for
/// untracked documents are defined no-op or empty-result outcomes, not
/// errors. Transport failures surface here only as a closed instance
/// channel.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The target instance's inbound channel is closed.
	#[error("service instance stopped")]
	ServiceStopped,
	/// A typed reply payload failed to decode.
	#[error("deserialization failed: {0}")]
	Deserialize(#[from] serde_json::Error),
}

/// Convert a file system path to a `file://` URI.
///
/// Returns `None` for paths that are not valid UTF-8 or do not parse as a
/// URI.
pub fn uri_from_path(path: &Path) -> Option<Uri> {
	let path = path.to_str()?;
	format!("file://{path}").parse().ok()
}

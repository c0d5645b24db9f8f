//! Document identity and per-instance tracking state.
//!
//! A [`Document`] is a projection of an editor buffer onto this crate: a
//! stable URI, a file system path, and a declared language id. The
//! [`DocumentRegistry`] owns the tracking relation ("which documents does
//! each instance consider open") so that no event handler can observe a
//! torn intermediate state across a suspension point.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use lsp_types::Uri;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;

/// An open document as seen by the editor host.
///
/// Not owned by this crate; handlers receive it with each event. The
/// language id is the only attribute this crate ever rewrites, and only
/// through [`crate::reclassify::ReclassificationPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
	/// Stable resource identifier.
	uri: Uri,
	/// File system path backing the document.
	path: PathBuf,
	/// Declared language id (e.g. "c", "cpp").
	language_id: String,
}

impl Document {
	/// Create a document from its parts.
	pub fn new(uri: Uri, path: impl Into<PathBuf>, language_id: impl Into<String>) -> Self {
		Self {
			uri,
			path: path.into(),
			language_id: language_id.into(),
		}
	}

	/// Create a document from a file system path.
	///
	/// Returns `None` if the path cannot be converted to a URI.
	pub fn from_path(path: impl Into<PathBuf>, language_id: impl Into<String>) -> Option<Self> {
		let path = path.into();
		let uri = crate::uri_from_path(&path)?;
		Some(Self {
			uri,
			path,
			language_id: language_id.into(),
		})
	}

	/// The document's URI.
	pub fn uri(&self) -> &Uri {
		&self.uri
	}

	/// The document's file system path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The declared language id.
	pub fn language_id(&self) -> &str {
		&self.language_id
	}

	/// A copy of this document relabeled with a different language id.
	pub fn with_language(&self, language_id: impl Into<String>) -> Self {
		Self {
			uri: self.uri.clone(),
			path: self.path.clone(),
			language_id: language_id.into(),
		}
	}
}

/// Tracking state for open documents, per instance.
///
/// A document is tracked by at most one instance at a time. Membership
/// always reflects the most recent completed mutation; guards are never
/// held across an await point.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
	/// Tracked document URIs keyed by owning instance.
	tracked: RwLock<HashMap<InstanceId, HashSet<String>>>,
}

impl DocumentRegistry {
	/// Create an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether `uri` is currently tracked by `instance`.
	pub fn is_tracked(&self, instance: InstanceId, uri: &Uri) -> bool {
		self.tracked
			.read()
			.get(&instance)
			.is_some_and(|docs| docs.contains(uri.as_str()))
	}

	/// Mark `uri` as tracked by `instance`.
	pub fn mark(&self, instance: InstanceId, uri: &Uri) {
		self.tracked
			.write()
			.entry(instance)
			.or_default()
			.insert(uri.as_str().to_owned());
	}

	/// Remove `uri` from `instance`'s tracked set.
	pub fn unmark(&self, instance: InstanceId, uri: &Uri) {
		let mut tracked = self.tracked.write();
		if let Some(docs) = tracked.get_mut(&instance) {
			docs.remove(uri.as_str());
			if docs.is_empty() {
				tracked.remove(&instance);
			}
		}
	}

	/// Number of documents tracked by `instance`.
	pub fn tracked_count(&self, instance: InstanceId) -> usize {
		self.tracked
			.read()
			.get(&instance)
			.map_or(0, HashSet::len)
	}

	/// Drop all tracking state for `instance` (instance teardown).
	pub fn clear_instance(&self, instance: InstanceId) {
		self.tracked.write().remove(&instance);
	}
}

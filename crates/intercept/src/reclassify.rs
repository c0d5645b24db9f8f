//! One-shot language reclassification on first open.
//!
//! Some documents are declared under a generic language (a C header used
//! from C++ is the classic case). On the open path, a content heuristic
//! supplied by the editor decides whether the document is really the more
//! specific kind; if so the owning instance learns a persistent
//! filename→language association, its settings view is refreshed, and the
//! editor relabels the document before the open payload is forwarded.
//!
//! The decision is one-shot per document: a relabeled document no longer
//! carries the generic language id, so the heuristic cannot fire again.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::document::Document;
use crate::host::EditorHost;
use crate::instance::InstanceHandle;

/// Content predicate deciding reclassification eligibility.
///
/// Implemented by the editor; this crate only consumes the verdict.
pub trait ReclassifyHeuristic: Send + Sync {
	/// Whether `text` at `path` should be treated as the specific kind.
	fn should_reclassify(&self, text: &str, path: &Path) -> bool;
}

/// A generic→specific language pair, e.g. `"c"` → `"cpp"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclassifyRule {
	/// Generic language id the rule applies to.
	pub from: String,
	/// Specific language id to relabel to.
	pub to: String,
}

/// Applies the reclassification rule on the open path.
#[derive(Clone)]
pub struct ReclassificationPolicy {
	rule: Option<ReclassifyRule>,
	heuristic: Arc<dyn ReclassifyHeuristic>,
}

impl std::fmt::Debug for ReclassificationPolicy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReclassificationPolicy")
			.field("rule", &self.rule)
			.finish_non_exhaustive()
	}
}

impl ReclassificationPolicy {
	/// Create a policy for one rule and its heuristic.
	pub fn new(rule: ReclassifyRule, heuristic: Arc<dyn ReclassifyHeuristic>) -> Self {
		Self {
			rule: Some(rule),
			heuristic,
		}
	}

	/// A policy that never reclassifies.
	pub fn disabled() -> Self {
		struct Never;
		impl ReclassifyHeuristic for Never {
			fn should_reclassify(&self, _text: &str, _path: &Path) -> bool {
				false
			}
		}
		Self {
			rule: None,
			heuristic: Arc::new(Never),
		}
	}

	/// Run the policy for a document being opened.
	///
	/// Returns the document the open sequence proceeds with: relabeled on
	/// a positive decision, untouched otherwise.
	pub async fn apply(
		&self,
		host: &dyn EditorHost,
		instance: &InstanceHandle,
		document: Document,
		text: &str,
	) -> Document {
		let Some(rule) = &self.rule else {
			return document;
		};
		if document.language_id() != rule.from {
			return document;
		}
		if !self.heuristic.should_reclassify(text, document.path()) {
			return document;
		}

		debug!(
			uri = document.uri().as_str(),
			from = %rule.from,
			to = %rule.to,
			"reclassifying document"
		);
		instance.add_file_association(mapping_key(document.path()), rule.to.clone());
		instance.notify_settings_changed();
		host.set_document_language(&document, &rule.to).await
	}
}

/// Association key for a reclassified file: `basename + "@" + full path`.
///
/// Keying on both parts makes future encounters of the same basename in the
/// same directory context resolve consistently.
pub fn mapping_key(path: &Path) -> String {
	let basename = path
		.file_name()
		.map(|name| name.to_string_lossy())
		.unwrap_or_default();
	format!("{basename}@{}", path.display())
}

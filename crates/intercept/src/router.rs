//! Ownership routing: which instance is responsible for a document.
//!
//! Instances are registered against a workspace root; a document resolves
//! to the instance with the longest root that prefixes its path. When no
//! root matches, the active instance answers for the stray document; when
//! no instance is registered at all, resolution yields `None` and callers
//! defer the event instead of forwarding it to a placeholder.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::document::{Document, DocumentRegistry};
use crate::instance::{InstanceHandle, InstanceId};

/// Resolves documents to their owning instance.
///
/// Injected into the interceptor at construction; there is no process-wide
/// instance lookup.
pub struct OwnershipRouter {
	/// Shared tracking state, consulted by [`OwnershipRouter::claim`].
	registry: Arc<DocumentRegistry>,
	/// Registered instances and their workspace roots.
	instances: RwLock<Vec<(PathBuf, InstanceHandle)>>,
	/// The instance owning the active view.
	active: RwLock<Option<InstanceId>>,
}

impl OwnershipRouter {
	/// Create a router over a shared document registry.
	pub fn new(registry: Arc<DocumentRegistry>) -> Self {
		Self {
			registry,
			instances: RwLock::new(Vec::new()),
			active: RwLock::new(None),
		}
	}

	/// The shared document registry.
	pub fn registry(&self) -> &Arc<DocumentRegistry> {
		&self.registry
	}

	/// Register an instance for a workspace root.
	///
	/// The first registered instance becomes the active one.
	pub fn register_instance(&self, root: impl Into<PathBuf>, handle: InstanceHandle) {
		let root = root.into();
		info!(instance = handle.id().0, name = handle.name(), root = %root.display(), "instance registered");
		self.instances.write().push((root, handle.clone()));
		let mut active = self.active.write();
		if active.is_none() {
			*active = Some(handle.id());
		}
	}

	/// Remove an instance and all of its tracking state.
	pub fn remove_instance(&self, id: InstanceId) {
		self.instances.write().retain(|(_, handle)| handle.id() != id);
		self.registry.clear_instance(id);
		let mut active = self.active.write();
		if *active == Some(id) {
			*active = self.instances.read().first().map(|(_, handle)| handle.id());
		}
	}

	/// Make `id` the active instance. Returns false if it is not
	/// registered.
	pub fn set_active(&self, id: InstanceId) -> bool {
		let known = self
			.instances
			.read()
			.iter()
			.any(|(_, handle)| handle.id() == id);
		if known {
			*self.active.write() = Some(id);
		}
		known
	}

	/// The instance owning the active view, if any instance is registered.
	pub fn active_instance(&self) -> Option<InstanceHandle> {
		let active = *self.active.read();
		let instances = self.instances.read();
		active.and_then(|id| {
			instances
				.iter()
				.find(|(_, handle)| handle.id() == id)
				.map(|(_, handle)| handle.clone())
		})
	}

	/// Look up a registered instance by id.
	pub fn instance(&self, id: InstanceId) -> Option<InstanceHandle> {
		self.instances
			.read()
			.iter()
			.find(|(_, handle)| handle.id() == id)
			.map(|(_, handle)| handle.clone())
	}

	/// Resolve the instance responsible for `document`.
	///
	/// `None` means "not yet": no instance is registered, so the event is
	/// deferred rather than misrouted.
	pub fn resolve(&self, document: &Document) -> Option<InstanceHandle> {
		let instances = self.instances.read();
		let owner = instances
			.iter()
			.filter(|(root, _)| document.path().starts_with(root))
			.max_by_key(|(root, _)| root.components().count())
			.map(|(_, handle)| handle.clone());
		if owner.is_some() {
			return owner;
		}
		drop(instances);
		let fallback = self.active_instance();
		if let Some(handle) = &fallback {
			debug!(
				instance = handle.id().0,
				uri = document.uri().as_str(),
				"no root matches, routing to active instance"
			);
		}
		fallback
	}

	/// Whether `handle` may process an open for `document`.
	///
	/// True only if `handle` is the resolved owner *and* the document is
	/// not already tracked by it. Duplicate opens (activation-time scan
	/// racing a visibility notification) fail the second condition.
	pub fn claim(&self, handle: &InstanceHandle, document: &Document) -> bool {
		match self.resolve(document) {
			Some(owner) if owner.id() == handle.id() => {
				!self.registry.is_tracked(handle.id(), document.uri())
			}
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::instance::NoOpHooks;

	fn instance(id: u64) -> InstanceHandle {
		// Routing never touches the inbound channel, so the receiver can go.
		let (handle, _inbound) = InstanceHandle::new(InstanceId(id), "clangd", Arc::new(NoOpHooks));
		handle
	}

	fn router_with_roots(roots: &[(&str, u64)]) -> OwnershipRouter {
		let router = OwnershipRouter::new(Arc::new(DocumentRegistry::new()));
		for (root, id) in roots {
			router.register_instance(*root, instance(*id));
		}
		router
	}

	#[test]
	fn test_resolve_prefers_longest_root() {
		let router = router_with_roots(&[("/ws", 1), ("/ws/vendor", 2)]);
		let doc = Document::from_path("/ws/vendor/lib.c", "c").unwrap();
		assert_eq!(router.resolve(&doc).unwrap().id(), InstanceId(2));

		let doc = Document::from_path("/ws/main.c", "c").unwrap();
		assert_eq!(router.resolve(&doc).unwrap().id(), InstanceId(1));
	}

	#[test]
	fn test_resolve_falls_back_to_active() {
		let router = router_with_roots(&[("/ws", 1), ("/other", 2)]);
		router.set_active(InstanceId(2));
		let doc = Document::from_path("/elsewhere/a.c", "c").unwrap();
		assert_eq!(router.resolve(&doc).unwrap().id(), InstanceId(2));
	}

	#[test]
	fn test_resolve_without_instances_defers() {
		let router = router_with_roots(&[]);
		let doc = Document::from_path("/ws/a.c", "c").unwrap();
		assert!(router.resolve(&doc).is_none());
	}

	#[test]
	fn test_claim_rejects_non_owner_and_duplicates() {
		let router = router_with_roots(&[("/ws", 1), ("/other", 2)]);
		let doc = Document::from_path("/ws/a.c", "c").unwrap();
		let owner = router.instance(InstanceId(1)).unwrap();
		let other = router.instance(InstanceId(2)).unwrap();

		assert!(!router.claim(&other, &doc));
		assert!(router.claim(&owner, &doc));

		router.registry().mark(owner.id(), doc.uri());
		assert!(!router.claim(&owner, &doc));
	}

	#[test]
	fn test_remove_instance_clears_tracking_and_active() {
		let router = router_with_roots(&[("/ws", 1), ("/other", 2)]);
		let doc = Document::from_path("/ws/a.c", "c").unwrap();
		router.registry().mark(InstanceId(1), doc.uri());

		router.remove_instance(InstanceId(1));
		assert!(!router.registry().is_tracked(InstanceId(1), doc.uri()));
		assert_eq!(router.active_instance().unwrap().id(), InstanceId(2));
	}
}

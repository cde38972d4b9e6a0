//! Presentation resources owned by one session interface
//!
//! Every node a game creates goes through `Scene`, so teardown can dispose
//! all of them without the game's cooperation.

use glam::Vec3;
use tracing::trace;

use crate::device::{NodeHandle, NodeSpec, Presenter};

pub struct Scene {
    presenter: Box<dyn Presenter>,
    root: Option<NodeHandle>,
    origin: Vec3,
    /// Spawned nodes in creation order
    nodes: Vec<NodeHandle>,
}

impl Scene {
    pub fn new(presenter: Box<dyn Presenter>) -> Self {
        Self {
            presenter,
            root: None,
            origin: Vec3::ZERO,
            nodes: Vec::new(),
        }
    }

    /// Create the presentation root at `origin`. No-op if already open.
    ///
    /// The session interface opens the scene on activation.
    pub fn open(&mut self, origin: Vec3) -> NodeHandle {
        if let Some(root) = self.root {
            return root;
        }
        let root = self.presenter.create_presentation_root();
        self.root = Some(root);
        self.origin = origin;
        trace!(root = root.0, "Presentation root created");
        root
    }

    pub fn is_open(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<NodeHandle> {
        self.root
    }

    /// World position of the root.
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Create a node under the root. `None` when the scene is not open.
    pub fn spawn(&mut self, spec: &NodeSpec) -> Option<NodeHandle> {
        let root = self.root?;
        let node = self.presenter.create_node(root, spec);
        self.nodes.push(node);
        Some(node)
    }

    /// Dispose one spawned node early. Unknown handles are ignored.
    pub fn despawn(&mut self, node: NodeHandle) -> bool {
        let Some(index) = self.nodes.iter().position(|n| *n == node) else {
            return false;
        };
        self.nodes.remove(index);
        self.presenter.dispose(node);
        true
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Dispose every spawned node, newest first, then the root.
    pub(crate) fn dispose_all(&mut self) {
        while let Some(node) = self.nodes.pop() {
            self.presenter.dispose(node);
        }
        if let Some(root) = self.root.take() {
            self.presenter.dispose(root);
            trace!(root = root.0, "Presentation root disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessPresenter;

    #[test]
    fn test_spawn_requires_open_scene() {
        let presenter = HeadlessPresenter::new();
        let mut scene = Scene::new(Box::new(presenter.clone()));

        assert!(scene.spawn(&NodeSpec::new("early", Vec3::ZERO)).is_none());
        scene.open(Vec3::ONE);
        assert!(scene.spawn(&NodeSpec::new("floor", Vec3::ZERO)).is_some());
        assert_eq!(scene.origin(), Vec3::ONE);
        assert_eq!(presenter.live_nodes(), 2);
    }

    #[test]
    fn test_dispose_all_releases_everything() {
        let presenter = HeadlessPresenter::new();
        let mut scene = Scene::new(Box::new(presenter.clone()));
        scene.open(Vec3::ZERO);
        let a = scene.spawn(&NodeSpec::new("a", Vec3::ZERO)).unwrap();
        scene.spawn(&NodeSpec::new("b", Vec3::ZERO));

        assert!(scene.despawn(a));
        assert!(!scene.despawn(a));
        scene.dispose_all();
        scene.dispose_all();

        assert!(!scene.is_open());
        assert_eq!(scene.node_count(), 0);
        assert_eq!(presenter.live_nodes(), 0);
        assert_eq!(presenter.disposed_nodes(), 3);
    }
}

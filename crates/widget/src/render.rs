//! Rendering seam.
//!
//! The engine never touches a document directly. It hands node lists to a
//! [`Renderer`]: a full render on structural changes, a single-node patch
//! when only the totals moved.

use crate::view::Node;

/// Draws view nodes somewhere.
pub trait Renderer {
    /// Replace everything with `nodes`.
    fn render(&mut self, nodes: Vec<Node>);

    /// Replace the node with the same key.
    fn patch(&mut self, node: Node);
}

/// Keeps the node tree in memory. Used by tests and headless callers.
#[derive(Debug, Default)]
pub struct MemoryRenderer {
    nodes: Vec<Node>,
    renders: usize,
    patches: usize,
}

impl MemoryRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Find a node by key.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Number of full renders so far.
    #[must_use]
    pub const fn render_count(&self) -> usize {
        self.renders
    }

    /// Number of patches so far.
    #[must_use]
    pub const fn patch_count(&self) -> usize {
        self.patches
    }
}

impl Renderer for MemoryRenderer {
    fn render(&mut self, nodes: Vec<Node>) {
        self.nodes = nodes;
        self.renders += 1;
    }

    fn patch(&mut self, node: Node) {
        if let Some(existing) = self.nodes.iter_mut().find(|n| n.key == node.key) {
            *existing = node;
        } else {
            self.nodes.push(node);
        }
        self.patches += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::NodeKind;

    fn banner(key: &str, message: &str) -> Node {
        Node {
            key: key.to_string(),
            kind: NodeKind::Banner {
                message: message.to_string(),
            },
        }
    }

    #[test]
    fn test_patch_replaces_by_key() {
        let mut renderer = MemoryRenderer::new();
        renderer.render(vec![banner("a", "one"), banner("b", "two")]);
        renderer.patch(banner("b", "three"));

        assert_eq!(renderer.nodes().len(), 2);
        assert_eq!(renderer.find("b"), Some(&banner("b", "three")));
        assert_eq!(renderer.render_count(), 1);
        assert_eq!(renderer.patch_count(), 1);
    }

    #[test]
    fn test_patch_appends_unknown_key() {
        let mut renderer = MemoryRenderer::new();
        renderer.patch(banner("x", "hi"));
        assert_eq!(renderer.nodes().len(), 1);
    }
}

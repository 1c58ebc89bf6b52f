use crate::util::Stats;

use super::{MeshBvh, NodeIdx};

impl MeshBvh {
    /// Dumps the tree to stdout in depth-first order, one node per line.
    pub fn print_tree(&self) {
        self.print_recursive(0, Self::ROOT);
    }

    pub fn print_statistics(&self) {
        println!("Nodes: {}", self.node_count());
        println!("Leaf depth: {}", self.depth_statistics());
        println!("Leaf fill: {}", self.leaf_fill_statistics());
    }

    /// Depth of every leaf, root counting as depth 1.
    pub fn depth_statistics(&self) -> Stats {
        self.depth_statistics_recursive(Self::ROOT)
    }

    fn depth_statistics_recursive(&self, idx: NodeIdx) -> Stats {
        let node = self.node(idx);

        if node.is_leaf() {
            return Stats::new_single(1);
        }

        let mut ret = [node.left, node.right]
            .into_iter()
            .flatten()
            .map(|child| self.depth_statistics_recursive(child))
            .reduce(|a, b| a.merge(&b))
            .expect("internal nodes have at least one child");

        ret.shift(1);
        ret
    }

    /// Number of used face slots per leaf.
    pub fn leaf_fill_statistics(&self) -> Stats {
        let mut stats = Stats::default();
        stats.add_samples(
            self.iter_nodes()
                .filter(|(_, node)| node.is_leaf())
                .map(|(_, node)| node.face_count()),
        );
        stats
    }

    fn print_recursive(&self, indent: usize, idx: NodeIdx) {
        let node = self.node(idx);

        println!(
            "{}- {}{}: {:?}-{:?}",
            "  ".repeat(indent),
            if node.is_leaf() { "L" } else { "I" },
            idx.raw(),
            node.bounds.min,
            node.bounds.max,
        );

        if node.is_leaf() {
            for face in node.faces.iter().flatten() {
                println!("{}f{}", "  ".repeat(indent + 1), face.raw());
            }
            return;
        }

        for child in [node.left, node.right].into_iter().flatten() {
            self.print_recursive(indent + 1, child);
        }
    }
}

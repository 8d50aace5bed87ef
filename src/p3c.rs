// Partitioned PPC-tree
// 1. Top part: grow breadth-wise from the root; every node keeps the rows that still have
//    selectors left below it, and stops growing once it holds at most `max_instance_count` rows.
//    Nodes without children are the frontier leaves.
// 2. For each frontier leaf, in DFS order: mount its subtree, extend the global pre/post
//    numbering into it, append its nodes to the Nlists, free it. Ancestors receive `pre` when
//    their first leaf is reached and `pos` once their last leaf has been coded, so the numbering
//    equals that of one DFS over the whole tree.

use tracing::debug;

use crate::nlist::Nlist;
use crate::ppc::{
    assign_codes_dfs, collect_entries, insert_path, reserve_nodes, search_child, InstanceGroup,
    PpcNode, PrePostCounter, NO_PARENT, UNASSIGNED,
};
use crate::common::check_row_count;
use crate::error::{Error, Result};

pub struct P3cTree<'a> {
    records: &'a [Vec<u32>],
    /// Top part; the root is index 0.
    nodes: Vec<PpcNode>,
    /// The mounted subtree. Index 0 mirrors the frontier leaf it hangs from.
    subtree: Vec<PpcNode>,
    mounted: Option<u32>,
    leaves: Vec<u32>,
    /// Index into `leaves` of the next leaf to process.
    next_leaf: usize,
    nlists: Vec<Nlist>,
    counter: PrePostCounter,
    node_budget: Option<usize>,
    built_nodes: usize,
    peak_resident: usize,
}

impl<'a> P3cTree<'a> {
    /// `records` must hold ascending selector IDs below `selector_count`.
    pub fn new(records: &'a [Vec<u32>], selector_count: usize, node_budget: Option<usize>) -> Self {
        let mut nodes = Vec::with_capacity(256);
        nodes.push(PpcNode::root());
        P3cTree {
            records,
            nodes,
            subtree: Vec::new(),
            mounted: None,
            leaves: Vec::new(),
            next_leaf: 0,
            nlists: vec![Nlist::new(); selector_count],
            counter: PrePostCounter::default(),
            node_budget,
            built_nodes: 0,
            peak_resident: 0,
        }
    }

    /// Grow the top part until every frontier leaf holds at most `max_instance_count` rows.
    pub fn build_top_part(&mut self, max_instance_count: usize) -> Result<()> {
        let records = self.records;
        check_row_count(records.len())?;
        for (row, record) in records.iter().enumerate() {
            self.nodes[0].count += 1;
            if !record.is_empty() {
                self.grow(0, row as u32, 1)?;
            }
        }
        self.build_top_part_below(0, max_instance_count as u64)?;

        self.leaves.clear();
        self.next_leaf = 0;
        let mut stack: Vec<u32> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            let children = &self.nodes[node as usize].children;
            if children.is_empty() {
                self.leaves.push(node);
            } else {
                stack.extend(children.iter().rev());
            }
        }

        self.built_nodes = self.nodes.len() - 1;
        self.peak_resident = self.built_nodes;
        debug!(
            top_nodes = self.built_nodes,
            frontier_leaves = self.leaves.len(),
            max_instance_count,
            "top part built"
        );
        Ok(())
    }

    fn build_top_part_below(&mut self, node: u32, max_instance_count: u64) -> Result<()> {
        for k in 0..self.nodes[node as usize].children.len() {
            let child = self.nodes[node as usize].children[k];
            if self.nodes[child as usize].count > max_instance_count {
                self.grow_one_level(child)?;
                self.build_top_part_below(child, max_instance_count)?;
            }
        }
        Ok(())
    }

    /// Split the node's rows among new children; the node's instance group is released.
    fn grow_one_level(&mut self, node: u32) -> Result<()> {
        let Some(group) = self.nodes[node as usize].instances.take() else {
            return Ok(());
        };
        for &row in &group.rows {
            self.grow(node, row, group.level)?;
        }
        Ok(())
    }

    /// Route one row into the child of `node` for its selector at `level` from the end.
    fn grow(&mut self, node: u32, row: u32, level: usize) -> Result<()> {
        let record = &self.records[row as usize];
        let item = record[record.len() - level];
        let has_more = record.len() > level;

        match search_child(&self.nodes, node, item) {
            Ok(child) => {
                let child = &mut self.nodes[child as usize];
                child.count += 1;
                if has_more {
                    if let Some(group) = child.instances.as_mut() {
                        group.rows.push(row);
                    }
                }
            }
            Err(position) => {
                reserve_nodes(&mut self.nodes, 1, 0, self.node_budget)?;
                let child = self.nodes.len() as u32;
                let mut new_node = PpcNode::new(item, 1, node);
                new_node.instances = Some(InstanceGroup {
                    level: level + 1,
                    rows: if has_more { vec![row] } else { Vec::new() },
                });
                self.nodes.push(new_node);
                self.nodes[node as usize].children.insert(position, child);
            }
        }
        Ok(())
    }

    /// Frontier leaves of the top part, in DFS order.
    ///
    /// Each leaf goes through [`build_subtree`](Self::build_subtree),
    /// [`assign_pre_post_code_for_subtree`](Self::assign_pre_post_code_for_subtree),
    /// [`update_nlists`](Self::update_nlists) and [`free_subtree`](Self::free_subtree) before
    /// the next one, strictly in this order; the numbering relies on it.
    pub fn frontier_leaves(&self) -> &[u32] {
        &self.leaves
    }

    /// The leaf the cycle expects next, `None` once every leaf is done.
    pub fn next_leaf(&self) -> Option<u32> {
        self.leaves.get(self.next_leaf).copied()
    }

    /// Insert the leaf's retained row suffixes below it.
    ///
    /// `leaf` must be [`next_leaf`](Self::next_leaf) and the previous subtree must be freed.
    pub fn build_subtree(&mut self, leaf: u32) -> Result<()> {
        if let Some(mounted) = self.mounted {
            return Err(Error::invalid_argument(format!(
                "subtree of leaf {} is still mounted",
                mounted
            )));
        }
        if self.next_leaf() != Some(leaf) {
            return Err(Error::invalid_argument(format!(
                "frontier leaf {} is out of order; expected {:?}",
                leaf,
                self.next_leaf()
            )));
        }
        let records = self.records;
        let leaf_node = &self.nodes[leaf as usize];
        self.subtree.clear();
        self.subtree.push(PpcNode::new(leaf_node.item, leaf_node.count, NO_PARENT));
        self.mounted = Some(leaf);

        if let Some(group) = self.nodes[leaf as usize].instances.take() {
            // top part without the root; the subtree arena does not count its mirror node
            let resident = self.nodes.len() - 1;
            for &row in &group.rows {
                let record = &records[row as usize];
                let end = record.len() + 1 - group.level;
                insert_path(&mut self.subtree, 0, &record[..end], resident, self.node_budget)?;
            }
        }

        let subtree_nodes = self.subtree.len() - 1;
        self.built_nodes += subtree_nodes;
        self.peak_resident = self.peak_resident.max(self.count_nodes());
        Ok(())
    }

    /// Extend the global numbering over the leaf, its mounted subtree and whichever ancestors
    /// become complete. `leaf` must be [`next_leaf`](Self::next_leaf).
    pub fn assign_pre_post_code_for_subtree(&mut self, leaf: u32) {
        debug_assert_eq!(self.next_leaf(), Some(leaf), "frontier leaf out of order");
        // Ancestors opened by this leaf, outermost first.
        let mut chain = Vec::new();
        let mut node = self.nodes[leaf as usize].parent;
        while node != 0 && self.nodes[node as usize].pre == UNASSIGNED {
            chain.push(node);
            node = self.nodes[node as usize].parent;
        }
        for &ancestor in chain.iter().rev() {
            self.nodes[ancestor as usize].pre = self.counter.next_pre();
        }

        if self.mounted == Some(leaf) {
            assign_codes_dfs(&mut self.subtree, 0, &mut self.counter);
            let (pre, pos) = (self.subtree[0].pre, self.subtree[0].pos);
            let leaf_node = &mut self.nodes[leaf as usize];
            leaf_node.pre = pre;
            leaf_node.pos = pos;
        } else {
            let leaf_node = &mut self.nodes[leaf as usize];
            leaf_node.pre = self.counter.next_pre();
            leaf_node.pos = self.counter.next_pos();
        }

        // Ancestors closed by this leaf: walk up while the node is its parent's last child.
        let mut node = leaf;
        loop {
            let parent = self.nodes[node as usize].parent;
            if parent == 0 || parent == NO_PARENT {
                break;
            }
            if self.nodes[parent as usize].children.last() != Some(&node) {
                break;
            }
            let ancestor = &mut self.nodes[parent as usize];
            ancestor.pos = self.counter.next_pos();
            self.nlists[ancestor.item as usize].add(ancestor.entry());
            node = parent;
        }
    }

    /// Append the leaf and every node of its mounted subtree to the Nlists.
    /// `leaf` must be [`next_leaf`](Self::next_leaf).
    pub fn update_nlists(&mut self, leaf: u32) {
        debug_assert_eq!(self.next_leaf(), Some(leaf), "frontier leaf out of order");
        if self.mounted == Some(leaf) {
            collect_entries(&self.subtree, 0, &mut self.nlists);
        } else {
            let leaf_node = &self.nodes[leaf as usize];
            self.nlists[leaf_node.item as usize].add(leaf_node.entry());
        }
    }

    /// Drop the mounted subtree, and the parent's child list once its last child is done.
    /// Moves the cycle on to the next frontier leaf.
    pub fn free_subtree(&mut self, leaf: u32) {
        debug_assert_eq!(self.next_leaf(), Some(leaf), "frontier leaf out of order");
        if self.next_leaf() == Some(leaf) {
            self.next_leaf += 1;
        }
        if self.mounted == Some(leaf) {
            self.subtree.clear();
            self.mounted = None;
        }
        let leaf_node = &mut self.nodes[leaf as usize];
        leaf_node.children = Vec::new();
        leaf_node.instances = None;

        let parent = leaf_node.parent;
        if parent != NO_PARENT && self.nodes[parent as usize].children.last() == Some(&leaf) {
            self.nodes[parent as usize].children = Vec::new();
        }
    }

    /// Nodes currently held: top part plus the mounted subtree, root excluded.
    pub fn count_nodes(&self) -> usize {
        self.nodes.len() - 1 + self.subtree.len().saturating_sub(1)
    }

    /// Nodes created over the whole build, i.e. the size of the equivalent full tree.
    pub fn built_node_count(&self) -> usize {
        self.built_nodes
    }

    pub fn peak_resident_nodes(&self) -> usize {
        self.peak_resident
    }

    /// Largest row count a frontier leaf had to build its subtree from.
    pub fn max_subtree_instance_count(&self) -> u64 {
        self.leaves
            .iter()
            .map(|&leaf| self.nodes[leaf as usize].count)
            .max()
            .unwrap_or(0)
    }

    /// Efficiency to try next time: `row_count / (max_subtree_instance_count / 2)`.
    pub fn recommended_efficiency(&self) -> usize {
        let row_count = self.nodes[0].count as usize;
        let half = (self.max_subtree_instance_count() / 2).max(1) as usize;
        (row_count / half).max(1)
    }

    pub fn counter(&self) -> PrePostCounter {
        self.counter
    }

    pub fn into_nlists(mut self) -> Vec<Nlist> {
        for nlist in self.nlists.iter_mut() {
            nlist.shrink_to_fit();
        }
        self.nlists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppc::PpcTree;

    fn run_all(tree: &mut P3cTree<'_>) {
        for k in 0..tree.frontier_leaves().len() {
            let leaf = tree.frontier_leaves()[k];
            tree.build_subtree(leaf).unwrap();
            tree.assign_pre_post_code_for_subtree(leaf);
            tree.update_nlists(leaf);
            tree.free_subtree(leaf);
        }
    }

    fn records() -> Vec<Vec<u32>> {
        vec![
            vec![0, 2, 5],
            vec![1, 2, 5],
            vec![3, 5],
            vec![0, 4],
            vec![1, 2, 4],
            vec![5],
            vec![],
            vec![0, 1, 3, 4, 5],
        ]
    }

    #[test]
    fn test_top_part_frontier() {
        let records = records();
        let mut tree = P3cTree::new(&records, 6, None);
        tree.build_top_part(2).unwrap();

        // root -> 4 (2 rows, leaf); root -> 5 (5 rows) -> {2, 3, 4}
        let items: Vec<u32> = tree
            .frontier_leaves()
            .iter()
            .map(|&l| tree.nodes[l as usize].item)
            .collect();
        assert_eq!(items, vec![4, 2, 3, 4]);
        assert!(tree.frontier_leaves().iter().all(|&l| tree.nodes[l as usize].count <= 2));
        assert_eq!(tree.nodes[0].count, 8);
    }

    #[test]
    fn test_numbering_matches_full_tree() {
        let records = records();
        let mut full = PpcTree::build(&records, None).unwrap();
        let expected = full.create_nlists(6);
        let counter = {
            let mut c = PrePostCounter::default();
            for (_, pre, pos, _) in full.codes() {
                c.pre = c.pre.max(pre + 1);
                c.pos = c.pos.max(pos + 1);
            }
            c
        };

        for max_instance_count in 0..=8 {
            let mut tree = P3cTree::new(&records, 6, None);
            tree.build_top_part(max_instance_count).unwrap();
            run_all(&mut tree);
            assert_eq!(tree.counter(), counter, "max_instance_count {}", max_instance_count);
            assert_eq!(tree.built_node_count(), full.count_nodes());
            assert_eq!(tree.into_nlists(), expected, "max_instance_count {}", max_instance_count);
        }
    }

    #[test]
    fn test_subtrees_freed() {
        let records = records();
        let mut tree = P3cTree::new(&records, 6, None);
        tree.build_top_part(2).unwrap();
        let top = tree.count_nodes();
        run_all(&mut tree);
        assert!(tree.subtree.is_empty());
        assert_eq!(tree.count_nodes(), top);
        assert_eq!(top, 5);
        assert_eq!(tree.built_node_count(), 13);
        // top part plus the largest subtree
        assert_eq!(tree.peak_resident_nodes(), 8);
    }

    #[test]
    fn test_recommended_efficiency() {
        let records = records();
        let mut tree = P3cTree::new(&records, 6, None);
        tree.build_top_part(8).unwrap();
        // leaves are the root children 4 (2 rows) and 5 (5 rows): 8 / (5 / 2)
        assert_eq!(tree.max_subtree_instance_count(), 5);
        assert_eq!(tree.recommended_efficiency(), 4);
    }

    #[test]
    fn test_leaves_must_follow_frontier_order() {
        let records = records();
        let mut tree = P3cTree::new(&records, 6, None);
        tree.build_top_part(2).unwrap();
        let leaves = tree.frontier_leaves().to_vec();
        assert_eq!(tree.next_leaf(), Some(leaves[0]));

        assert!(matches!(tree.build_subtree(leaves[1]), Err(Error::InvalidArgument(_))));
        assert!(tree.subtree.is_empty());

        tree.build_subtree(leaves[0]).unwrap();
        // still mounted
        assert!(matches!(tree.build_subtree(leaves[0]), Err(Error::InvalidArgument(_))));
        tree.assign_pre_post_code_for_subtree(leaves[0]);
        tree.update_nlists(leaves[0]);
        tree.free_subtree(leaves[0]);
        assert_eq!(tree.next_leaf(), Some(leaves[1]));

        // finishing in order still reproduces the full tree
        for &leaf in &leaves[1..] {
            tree.build_subtree(leaf).unwrap();
            tree.assign_pre_post_code_for_subtree(leaf);
            tree.update_nlists(leaf);
            tree.free_subtree(leaf);
        }
        assert_eq!(tree.next_leaf(), None);
        let mut full = PpcTree::build(&records, None).unwrap();
        assert_eq!(tree.into_nlists(), full.create_nlists(6));
    }

    #[test]
    fn test_budget_counts_same_nodes_as_count_nodes() {
        let records = records();
        // peak is the top part (5) plus the largest subtree (3)
        let mut tree = P3cTree::new(&records, 6, Some(8));
        tree.build_top_part(2).unwrap();
        run_all(&mut tree);
        assert_eq!(tree.peak_resident_nodes(), 8);

        let mut tree = P3cTree::new(&records, 6, Some(7));
        tree.build_top_part(2).unwrap();
        let mut failed = false;
        for k in 0..tree.frontier_leaves().len() {
            let leaf = tree.frontier_leaves()[k];
            if let Err(e) = tree.build_subtree(leaf) {
                assert!(e.is_resource_exhausted());
                failed = true;
                break;
            }
            tree.assign_pre_post_code_for_subtree(leaf);
            tree.update_nlists(leaf);
            tree.free_subtree(leaf);
        }
        assert!(failed);
    }
}

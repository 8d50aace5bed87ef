// PPC-tree (pre/post code prefix tree)
// 1. Insert every encoded record from its last (most frequent) selector to its first, so prefix
//    sharing is maximal near the root. Children stay sorted by item; lookup is a binary search.
// 2. One DFS from the root (root excluded) assigns `pre` on entry and `pos` on exit.
// 3. A node is summarized as (pre, pos, count); X is an ancestor of Y iff
//    X.pre < Y.pre && Y.pos < X.pos.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::nlist::{Nlist, NlistEntry};

pub(crate) const ROOT_ITEM: u32 = u32::MAX;
pub(crate) const NO_PARENT: u32 = u32::MAX;
pub(crate) const UNASSIGNED: u32 = u32::MAX;

/// Rows still to be inserted below a frontier node of a partitioned build.
///
/// `level` is the 1-based position, counted from the end of each record, of the next
/// selector to insert below the node.
#[derive(Debug, Clone, Default)]
pub(crate) struct InstanceGroup {
    pub level: usize,
    pub rows: Vec<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct PpcNode {
    pub item: u32,
    pub count: u64,
    /// Arena index of the parent; never owning.
    pub parent: u32,
    /// Arena indices, sorted ascending by the children's item.
    pub children: Vec<u32>,
    pub pre: u32,
    pub pos: u32,
    /// Present only while a partitioned build still has rows to push below this node.
    pub instances: Option<InstanceGroup>,
}

impl PpcNode {
    #[inline]
    pub fn new(item: u32, count: u64, parent: u32) -> Self {
        PpcNode {
            item,
            count,
            parent,
            children: Vec::new(),
            pre: UNASSIGNED,
            pos: UNASSIGNED,
            instances: None,
        }
    }

    #[inline]
    pub fn root() -> Self {
        PpcNode::new(ROOT_ITEM, 0, NO_PARENT)
    }

    #[inline]
    pub fn entry(&self) -> NlistEntry {
        NlistEntry {
            pre: self.pre,
            pos: self.pos,
            count: self.count,
        }
    }
}

/// The two monotonic code counters of one tree. Threaded by `&mut` through every phase
/// that assigns codes, so separate trees never share numbering state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrePostCounter {
    pub pre: u32,
    pub pos: u32,
}

impl PrePostCounter {
    #[inline]
    pub fn next_pre(&mut self) -> u32 {
        let code = self.pre;
        self.pre += 1;
        code
    }

    #[inline]
    pub fn next_pos(&mut self) -> u32 {
        let code = self.pos;
        self.pos += 1;
        code
    }
}

/// Binary search for `item` among the sorted children of `nodes[parent]`.
/// `Ok(child)` on a hit; `Err(position)` is where a new child keeps the list sorted.
#[inline]
pub(crate) fn search_child(nodes: &[PpcNode], parent: u32, item: u32) -> std::result::Result<u32, usize> {
    let children = &nodes[parent as usize].children;
    children
        .binary_search_by(|&c| nodes[c as usize].item.cmp(&item))
        .map(|i| children[i])
}

/// Make sure `nodes` can take `extra` more nodes without exceeding `budget`.
///
/// Index 0 of an arena (the root, or the mirror of a frontier leaf) is not counted;
/// `resident` counts nodes held elsewhere, e.g. the top part of a partitioned tree.
pub(crate) fn reserve_nodes(
    nodes: &mut Vec<PpcNode>,
    extra: usize,
    resident: usize,
    budget: Option<usize>,
) -> Result<()> {
    let live = resident + nodes.len().saturating_sub(1);
    if let Some(budget) = budget {
        if live + extra > budget {
            warn!(live, extra, budget, "tree node budget exceeded");
            return Err(Error::ResourceExhausted {
                resident: live,
                requested: extra,
                budget,
            });
        }
    }
    nodes.try_reserve(extra).map_err(|_| Error::ResourceExhausted {
        resident: live,
        requested: extra,
        budget: budget.unwrap_or(usize::MAX),
    })
}

/// Insert `items[..end]` from right to left below `start`, adding 1 to every node on the path.
///
/// The walk is read-only until the storage for any new nodes has been reserved, so a failed
/// insert leaves the tree untouched.
pub(crate) fn insert_path(
    nodes: &mut Vec<PpcNode>,
    start: u32,
    items: &[u32],
    resident: usize,
    budget: Option<usize>,
) -> Result<()> {
    debug_assert!(items.windows(2).all(|w| w[0] < w[1]));

    // Shared prefix: count how many items already exist on the path.
    let mut node = start;
    let mut matched = 0;
    for &item in items.iter().rev() {
        match search_child(nodes, node, item) {
            Ok(child) => {
                node = child;
                matched += 1;
            }
            Err(_) => break,
        }
    }
    let missing = items.len() - matched;
    if missing > 0 {
        reserve_nodes(nodes, missing, resident, budget)?;
    }

    let mut node = start;
    for &item in items.iter().rev() {
        node = match search_child(nodes, node, item) {
            Ok(child) => {
                nodes[child as usize].count += 1;
                child
            }
            Err(position) => {
                let child = nodes.len() as u32;
                nodes.push(PpcNode::new(item, 1, node));
                nodes[node as usize].children.insert(position, child);
                child
            }
        };
    }
    Ok(())
}

/// Assign codes to `node` and its whole subtree, in DFS order.
pub(crate) fn assign_codes_dfs(nodes: &mut [PpcNode], node: u32, counter: &mut PrePostCounter) {
    nodes[node as usize].pre = counter.next_pre();
    for k in 0..nodes[node as usize].children.len() {
        let child = nodes[node as usize].children[k];
        assign_codes_dfs(nodes, child, counter);
    }
    nodes[node as usize].pos = counter.next_pos();
}

/// Append (pre, pos, count) of `node` and its subtree to the Nlists, in pre order.
pub(crate) fn collect_entries(nodes: &[PpcNode], node: u32, nlists: &mut [Nlist]) {
    let n = &nodes[node as usize];
    nlists[n.item as usize].add(n.entry());
    for &child in &n.children {
        collect_entries(nodes, child, nlists);
    }
}

/// Whole prefix tree built in one pass. Node storage is a flat arena; the root is index 0.
pub struct PpcTree {
    pub(crate) nodes: Vec<PpcNode>,
    counter: PrePostCounter,
    node_budget: Option<usize>,
    coded: bool,
}

impl Default for PpcTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PpcTree {
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(256);
        nodes.push(PpcNode::root());
        PpcTree {
            nodes,
            counter: PrePostCounter::default(),
            node_budget: None,
            coded: false,
        }
    }

    /// A tree that refuses to hold more than `max_nodes` nodes (root excluded).
    pub fn with_node_budget(max_nodes: usize) -> Self {
        let mut tree = Self::new();
        tree.node_budget = Some(max_nodes);
        tree
    }

    /// Insert one ascending record, most frequent selector first.
    ///
    /// On `Err` the tree is exactly as before the call.
    pub fn insert_record(&mut self, sorted_ids: &[u32]) -> Result<()> {
        insert_path(&mut self.nodes, 0, sorted_ids, 0, self.node_budget)?;
        self.nodes[0].count += 1;
        self.coded = false;
        Ok(())
    }

    /// One DFS from the root's children: `pre` on entry, `pos` on exit.
    pub fn assign_pre_post_code(&mut self) {
        self.counter = PrePostCounter::default();
        let mut counter = self.counter;
        for k in 0..self.nodes[0].children.len() {
            let child = self.nodes[0].children[k];
            assign_codes_dfs(&mut self.nodes, child, &mut counter);
        }
        self.counter = counter;
        self.coded = true;
        debug!(nodes = self.count_nodes(), pre = counter.pre, pos = counter.pos, "pre/post codes assigned");
    }

    /// Number of nodes, root excluded.
    pub fn count_nodes(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Number of rows inserted so far.
    pub fn row_count(&self) -> u64 {
        self.nodes[0].count
    }

    pub fn is_coded(&self) -> bool {
        self.coded
    }

    /// One Nlist per selector, each sorted by `pre`. Assigns codes first if needed.
    pub fn create_nlists(&mut self, selector_count: usize) -> Vec<Nlist> {
        if !self.coded {
            self.assign_pre_post_code();
        }
        let mut nlists = vec![Nlist::new(); selector_count];
        for &child in &self.nodes[0].children {
            collect_entries(&self.nodes, child, &mut nlists);
        }
        for nlist in nlists.iter_mut() {
            nlist.shrink_to_fit();
        }
        nlists
    }

    /// Codes of every node in pre order: (item, pre, pos, count).
    pub fn codes(&self) -> Vec<(u32, u32, u32, u64)> {
        let mut out = Vec::with_capacity(self.count_nodes());
        let mut stack: Vec<u32> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node as usize];
            out.push((n.item, n.pre, n.pos, n.count));
            stack.extend(n.children.iter().rev());
        }
        out
    }

    /// Release every node except the root.
    pub fn free(&mut self) {
        self.nodes.truncate(1);
        self.nodes.shrink_to_fit();
        self.nodes[0].children = Vec::new();
        self.nodes[0].count = 0;
        self.counter = PrePostCounter::default();
        self.coded = false;
    }

    /// Build from every record of `records`, then assign codes.
    pub fn build<R: AsRef<[u32]>>(records: &[R], node_budget: Option<usize>) -> Result<Self> {
        let mut tree = match node_budget {
            Some(budget) => PpcTree::with_node_budget(budget),
            None => PpcTree::new(),
        };
        for record in records {
            tree.insert_record(record.as_ref())?;
        }
        tree.assign_pre_post_code();
        Ok(tree)
    }
}

use std::fmt;
use std::io::Write;

use tracing::{debug, info};

use crate::common::{check_itemset, selector_label, EncodedData, SupportCount};
use crate::config::BuildConfig;
use crate::error::Result;
use crate::growable::GrowableArray;
use crate::p3c::P3cTree;
use crate::ppc::PpcTree;

/// Summary of one tree node carrying a given selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NlistEntry {
    pub pre: u32,
    pub pos: u32,
    pub count: u64,
}

impl NlistEntry {
    /// `self` lies strictly below `ancestor` in the tree.
    #[inline(always)]
    pub fn is_descendant_of(&self, ancestor: &NlistEntry) -> bool {
        ancestor.pre < self.pre && self.pos < ancestor.pos
    }
}

/// All nodes of one selector (or the deepest nodes of an itemset), sorted by `pre`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Nlist {
    entries: GrowableArray<NlistEntry>,
}

impl Nlist {
    pub fn new() -> Self {
        Nlist {
            entries: GrowableArray::with_capacity(4),
        }
    }

    #[inline]
    pub fn add(&mut self, entry: NlistEntry) {
        debug_assert!(self.entries.is_empty() || self.entries.get(self.entries.size() - 1).pre < entry.pre);
        self.entries.add(entry);
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.entries.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[NlistEntry] {
        self.entries.as_slice()
    }

    pub fn support_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn shrink_to_fit(&mut self) {
        self.entries.shrink_to_fit();
    }

    /// Entries of `self` that have an ancestor in `ancestors`.
    ///
    /// With `self` the Nlist of a lower selector ID (deeper in the tree) and `ancestors` that
    /// of a higher one, the result is the Nlist of the combined itemset. Both inputs are sorted
    /// by `pre`, and nodes of one selector never nest, so one linear merge suffices.
    pub fn combine(&self, ancestors: &Nlist) -> Nlist {
        let desc = self.as_slice();
        let anc = ancestors.as_slice();
        let mut result = Nlist {
            entries: GrowableArray::with_capacity(desc.len().min(16)),
        };

        let (mut i, mut j) = (0, 0);
        while i < anc.len() && j < desc.len() {
            let a = &anc[i];
            let d = &desc[j];
            if a.pos < d.pos {
                // a closes before d: a is behind d or inside d, either way done with a
                i += 1;
            } else if a.pre < d.pre {
                result.entries.add(*d);
                j += 1;
            } else {
                // a opens after d: d has no ancestor left
                j += 1;
            }
        }
        result
    }
}

impl fmt::Debug for Nlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

/// Space-separated `(pre,pos,count)` triples.
impl fmt::Display for Nlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, e) in self.entries.iter().enumerate() {
            if k > 0 {
                f.write_str(" ")?;
            }
            write!(f, "({},{},{})", e.pre, e.pos, e.count)?;
        }
        Ok(())
    }
}

/// Nlist engine: one Nlist per selector, derived from a full or partitioned PPC-tree.
pub struct NlistBase {
    row_count: usize,
    nlists: Vec<Nlist>,
    node_count: usize,
    further_efficiency: Option<usize>,
}

impl NlistBase {
    /// Build through the whole tree, which is dropped once the Nlists exist.
    ///
    /// Fails with `Error::ResourceExhausted` when the tree outgrows `config.node_budget`;
    /// [`NlistBase::build_partitioned`] is the bounded-memory alternative.
    pub fn build(data: &EncodedData, config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        let mut tree = PpcTree::build(data.records(), config.node_budget)?;
        let node_count = tree.count_nodes();
        let nlists = tree.create_nlists(data.selector_count());
        tree.free();
        debug!(rows = data.row_count(), node_count, "nlists derived from full tree");

        Ok(NlistBase {
            row_count: data.row_count(),
            nlists,
            node_count,
            further_efficiency: None,
        })
    }

    /// Build a top part of the tree, then mount, encode, harvest and free one subtree per
    /// frontier leaf. Peak node count is the top part plus the largest subtree.
    pub fn build_partitioned(data: &EncodedData, config: &BuildConfig) -> Result<Self> {
        config.validate()?;
        let max_instance_count = config.max_instance_count(data.row_count());
        let mut tree = P3cTree::new(data.records(), data.selector_count(), config.node_budget);
        tree.build_top_part(max_instance_count)?;

        for k in 0..tree.frontier_leaves().len() {
            let leaf = tree.frontier_leaves()[k];
            tree.build_subtree(leaf)?;
            tree.assign_pre_post_code_for_subtree(leaf);
            tree.update_nlists(leaf);
            tree.free_subtree(leaf);
        }

        let node_count = tree.built_node_count();
        let further_efficiency = tree.recommended_efficiency();
        info!(
            rows = data.row_count(),
            efficiency = config.efficiency,
            max_instance_count,
            subtrees = tree.frontier_leaves().len(),
            peak_resident_nodes = tree.peak_resident_nodes(),
            further_efficiency,
            "partitioned build finished"
        );

        Ok(NlistBase {
            row_count: data.row_count(),
            nlists: tree.into_nlists(),
            node_count,
            further_efficiency: Some(further_efficiency),
        })
    }

    /// Nlists indexed by selector ID.
    pub fn nlists(&self) -> &[Nlist] {
        &self.nlists
    }

    /// Nodes of the (possibly never fully resident) tree the Nlists came from.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Efficiency recommended for a future partitioned build; `None` after a full build.
    pub fn further_efficiency(&self) -> Option<usize> {
        self.further_efficiency
    }

    /// Nlist of `itemset`, combining single-selector Nlists in ascending selector order.
    pub fn nlist_for_itemset(&self, itemset: &[u32]) -> Result<Nlist> {
        check_itemset(itemset, self.nlists.len())?;
        let mut ids = itemset.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let Some((&first, rest)) = ids.split_first() else {
            return Ok(Nlist::new());
        };
        let mut nlist = self.nlists[first as usize].clone();
        for &s in rest {
            if nlist.is_empty() {
                break;
            }
            nlist = nlist.combine(&self.nlists[s as usize]);
        }
        Ok(nlist)
    }

    /// One line per selector: `<label> -> <nlist>`.
    pub fn export_nlists<W: Write>(&self, w: &mut W, labels: Option<&[String]>) -> Result<()> {
        for (id, nlist) in self.nlists.iter().enumerate() {
            writeln!(w, "{} -> {}", selector_label(labels, id), nlist)?;
        }
        w.flush()?;
        Ok(())
    }
}

impl SupportCount for NlistBase {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn selector_count(&self) -> usize {
        self.nlists.len()
    }

    fn support_count(&self, itemset: &[u32]) -> Result<u64> {
        Ok(self.nlist_for_itemset(itemset)?.support_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn entry(pre: u32, pos: u32, count: u64) -> NlistEntry {
        NlistEntry { pre, pos, count }
    }

    fn nlist(entries: &[NlistEntry]) -> Nlist {
        let mut n = Nlist::new();
        for &e in entries {
            n.add(e);
        }
        n
    }

    #[test]
    fn test_combine_keeps_descendants_only() {
        // root -> A(0,3) -> b(1,0); A -> c(2,2) -> b(3,1); root -> b(4,4)
        let ancestors = nlist(&[entry(0, 3, 5)]);
        let desc = nlist(&[entry(1, 0, 2), entry(3, 1, 1), entry(4, 4, 7)]);
        let combined = desc.combine(&ancestors);
        assert_eq!(combined.as_slice(), &[entry(1, 0, 2), entry(3, 1, 1)]);
        assert_eq!(combined.support_count(), 3);
    }

    #[test]
    fn test_combine_disjoint_branches() {
        let ancestors = nlist(&[entry(0, 1, 1), entry(5, 6, 1)]);
        let desc = nlist(&[entry(2, 2, 1), entry(6, 5, 3)]);
        assert_eq!(desc.combine(&ancestors).as_slice(), &[entry(6, 5, 3)]);
        assert!(Nlist::new().combine(&ancestors).is_empty());
    }

    #[test]
    fn test_display() {
        let n = nlist(&[entry(0, 3, 5), entry(4, 4, 1)]);
        assert_eq!(n.to_string(), "(0,3,5) (4,4,1)");
        assert_eq!(Nlist::new().to_string(), "");
    }

    #[test]
    fn test_out_of_range_itemset_fails() {
        let data = EncodedData::new(2, vec![vec![0, 1], vec![1]]).unwrap();
        let base = NlistBase::build(&data, &BuildConfig::default()).unwrap();
        assert!(matches!(
            base.support_count(&[1, 2]),
            Err(Error::SelectorOutOfRange { selector: 2, selector_count: 2 })
        ));
        assert_eq!(base.support_count(&[]).unwrap(), 0);
        assert_eq!(base.support_count(&[0, 1]).unwrap(), 1);
        assert_eq!(base.support_count(&[1, 0, 1]).unwrap(), 1);
    }

    #[test]
    fn test_export_nlists() {
        let data = EncodedData::new(2, vec![vec![0, 1], vec![1]]).unwrap();
        let base = NlistBase::build(&data, &BuildConfig::default()).unwrap();
        let mut out = Vec::new();
        let labels = vec!["A=a".to_string(), "Y=y".to_string()];
        base.export_nlists(&mut out, Some(labels.as_slice())).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "A=a -> (1,0,1)\nY=y -> (0,1,2)\n");
    }
}

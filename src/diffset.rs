//! Complement representation: per selector, the ascending rows that do *not* contain it.
//!
//! Support of `{s1, s2, .., sk}` is `row_count - |D(s1) ∪ .. ∪ D(sk)|`. The layered count
//! never materializes the union: each layer subtracts the first diffset from the rest, so the
//! sizes removed from the running count are disjoint pieces of the union.

use std::cmp::Ordering;
use std::io::Write;

use tracing::debug;

use crate::common::{check_itemset, check_streamed_record, selector_label, EncodedData, SupportCount};
use crate::error::Result;
use crate::growable::GrowableArray;

/// Rows of `a` that are not in `b`. Both inputs ascending.
pub fn difference(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out
}

/// Rows in `a` or `b`. Both inputs ascending.
pub fn union(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn empty_sets(selector_count: usize) -> Vec<GrowableArray<u32>> {
    (0..selector_count).map(|_| GrowableArray::new()).collect()
}

/// Append `row` to the diffset of every selector the record lacks, walking
/// `[0, selector_count)` in lock-step with the record.
fn add_row(diffsets: &mut [GrowableArray<u32>], row: u32, record: &[u32]) {
    let mut present = record.iter().copied().peekable();
    for (s, diffset) in diffsets.iter_mut().enumerate() {
        if present.peek() == Some(&(s as u32)) {
            present.next();
        } else {
            diffset.add(row);
        }
    }
}

pub struct DiffsetBase {
    row_count: usize,
    diffsets: Vec<GrowableArray<u32>>,
}

impl DiffsetBase {
    pub fn build(data: &EncodedData) -> Self {
        let mut diffsets = empty_sets(data.selector_count());
        for (row, record) in data.records().iter().enumerate() {
            add_row(&mut diffsets, row as u32, record);
        }
        Self::finish(data.row_count(), diffsets)
    }

    /// Build in one pass over a record producer. Each record must be strictly ascending with
    /// IDs below `selector_count`.
    pub fn from_records<I, R>(selector_count: usize, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u32]>,
    {
        let mut diffsets = empty_sets(selector_count);
        let mut row_count = 0;
        for record in records {
            let record = record.as_ref();
            let row = check_streamed_record(row_count, record, selector_count)?;
            add_row(&mut diffsets, row, record);
            row_count += 1;
        }
        Ok(Self::finish(row_count, diffsets))
    }

    fn finish(row_count: usize, mut diffsets: Vec<GrowableArray<u32>>) -> Self {
        for diffset in diffsets.iter_mut() {
            diffset.shrink_to_fit();
        }
        debug!(rows = row_count, selectors = diffsets.len(), "diffsets built");
        DiffsetBase { row_count, diffsets }
    }

    pub fn diffsets(&self) -> &[GrowableArray<u32>] {
        &self.diffsets
    }

    pub fn diffset(&self, selector: u32) -> Option<&[u32]> {
        self.diffsets.get(selector as usize).map(|d| d.as_slice())
    }

    /// Rows missing at least one selector of `itemset`.
    pub fn union_diffset(&self, itemset: &[u32]) -> Result<Vec<u32>> {
        check_itemset(itemset, self.diffsets.len())?;
        let mut rows: Vec<u32> = Vec::new();
        for &s in itemset {
            rows = union(&rows, self.diffsets[s as usize].as_slice());
        }
        Ok(rows)
    }

    /// `row_count - |union of the itemset's diffsets|`.
    pub fn support_count_by_union(&self, itemset: &[u32]) -> Result<u64> {
        if itemset.is_empty() {
            return Ok(0);
        }
        let missing = self.union_diffset(itemset)?.len();
        Ok((self.row_count - missing) as u64)
    }

    /// Layered subtraction over the itemset's diffsets, in the given order.
    pub fn support_count_layered(&self, itemset: &[u32]) -> Result<u64> {
        check_itemset(itemset, self.diffsets.len())?;
        let Some((&first, rest)) = itemset.split_first() else {
            return Ok(0);
        };

        let mut count = self.row_count as u64;
        let mut first = self.diffsets[first as usize].as_slice().to_vec();
        let mut layer: Vec<Vec<u32>> = rest
            .iter()
            .map(|&s| difference(self.diffsets[s as usize].as_slice(), &first))
            .collect();
        count -= first.len() as u64;

        while !layer.is_empty() {
            first = layer.remove(0);
            count -= first.len() as u64;
            if first.is_empty() {
                continue;
            }
            for diffset in layer.iter_mut() {
                *diffset = difference(diffset.as_slice(), &first);
            }
        }
        Ok(count)
    }

    pub fn export_diffsets<W: Write>(&self, w: &mut W, labels: Option<&[String]>) -> Result<()> {
        writeln!(w, "------Diffsets------")?;
        for (id, diffset) in self.diffsets.iter().enumerate() {
            write!(w, "{}: not({}) -> ", id, selector_label(labels, id))?;
            for tid in diffset.iter() {
                write!(w, "{} ", tid)?;
            }
            writeln!(w)?;
        }
        w.flush()?;
        Ok(())
    }
}

impl SupportCount for DiffsetBase {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn selector_count(&self) -> usize {
        self.diffsets.len()
    }

    fn support_count(&self, itemset: &[u32]) -> Result<u64> {
        self.support_count_layered(itemset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn data() -> EncodedData {
        EncodedData::new(3, vec![vec![0, 2], vec![1, 2], vec![0, 1, 2], vec![]]).unwrap()
    }

    #[test]
    fn test_set_ops() {
        assert_eq!(difference(&[0, 1, 3, 5, 8], &[1, 2, 5]), vec![0, 3, 8]);
        assert_eq!(difference(&[1, 2], &[]), vec![1, 2]);
        assert_eq!(union(&[0, 3, 5], &[1, 3, 9]), vec![0, 1, 3, 5, 9]);
    }

    #[test]
    fn test_build_complements_rows() {
        let base = DiffsetBase::build(&data());
        assert_eq!(base.diffset(0), Some(&[1u32, 3][..]));
        assert_eq!(base.diffset(1), Some(&[0u32, 3][..]));
        // the empty record lacks every selector
        assert_eq!(base.diffset(2), Some(&[3u32][..]));
        for diffset in base.diffsets() {
            assert_eq!(diffset.capacity(), diffset.size());
        }
    }

    #[test]
    fn test_from_record_producer() {
        let data = data();
        let streamed = DiffsetBase::from_records(3, data.records()).unwrap();
        assert_eq!(streamed.diffsets(), DiffsetBase::build(&data).diffsets());
        assert_eq!(streamed.row_count(), 4);

        let rows = (0..4u32).map(|r| if r < 3 { vec![r % 2] } else { Vec::new() });
        let generated = DiffsetBase::from_records(2, rows).unwrap();
        assert_eq!(generated.diffset(0), Some(&[1u32, 3][..]));
        assert_eq!(generated.diffset(1), Some(&[0u32, 2, 3][..]));

        assert!(matches!(
            DiffsetBase::from_records(3, [[1u32, 1]]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            DiffsetBase::from_records(2, [[0u32, 2]]),
            Err(Error::SelectorOutOfRange { selector: 2, .. })
        ));
    }

    #[test]
    fn test_layered_matches_union() {
        let base = DiffsetBase::build(&data());
        for itemset in [vec![0], vec![0, 1], vec![2, 0], vec![0, 1, 2], vec![1, 1], vec![2, 1, 0]] {
            let layered = base.support_count_layered(&itemset).unwrap();
            let by_union = base.support_count_by_union(&itemset).unwrap();
            assert_eq!(layered, by_union, "{:?}", itemset);
        }
        assert_eq!(base.support_count(&[0, 1]).unwrap(), 1);
        assert_eq!(base.support_count(&[2]).unwrap(), 3);
        assert_eq!(base.union_diffset(&[0, 1]).unwrap(), vec![0, 1, 3]);
    }

    #[test]
    fn test_empty_and_out_of_range() {
        let base = DiffsetBase::build(&data());
        assert_eq!(base.support_count(&[]).unwrap(), 0);
        assert_eq!(base.support_count_by_union(&[]).unwrap(), 0);
        assert!(matches!(base.support_count(&[5]), Err(Error::SelectorOutOfRange { .. })));
        assert!(matches!(base.support_count_by_union(&[0, 5]), Err(Error::SelectorOutOfRange { .. })));
    }

    #[test]
    fn test_export_with_labels() {
        let base = DiffsetBase::build(&data());
        let labels: Vec<String> = ["A=a", "A=b", "Y=y"].iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        base.export_diffsets(&mut out, Some(labels.as_slice())).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "------Diffsets------\n0: not(A=a) -> 1 3 \n1: not(A=b) -> 0 3 \n2: not(Y=y) -> 3 \n"
        );
    }
}

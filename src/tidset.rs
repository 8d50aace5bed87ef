use std::io::Write;

use tracing::debug;

use crate::common::{check_itemset, check_streamed_record, selector_label, EncodedData, SupportCount};
use crate::error::Result;
use crate::growable::GrowableArray;

/// Rows of `a` that are also in `b`. Both inputs ascending.
pub fn intersect(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn empty_sets(selector_count: usize) -> Vec<GrowableArray<u32>> {
    (0..selector_count).map(|_| GrowableArray::new()).collect()
}

#[inline]
fn add_row(tidsets: &mut [GrowableArray<u32>], row: u32, record: &[u32]) {
    for &s in record {
        tidsets[s as usize].add(row);
    }
}

/// Vertical representation: per selector, the ascending rows that contain it.
pub struct TidsetBase {
    row_count: usize,
    tidsets: Vec<GrowableArray<u32>>,
}

impl TidsetBase {
    pub fn build(data: &EncodedData) -> Self {
        let mut tidsets = empty_sets(data.selector_count());
        for (row, record) in data.records().iter().enumerate() {
            add_row(&mut tidsets, row as u32, record);
        }
        Self::finish(data.row_count(), tidsets)
    }

    /// Build in one pass over a record producer. Each record must be strictly ascending with
    /// IDs below `selector_count`.
    pub fn from_records<I, R>(selector_count: usize, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u32]>,
    {
        let mut tidsets = empty_sets(selector_count);
        let mut row_count = 0;
        for record in records {
            let record = record.as_ref();
            let row = check_streamed_record(row_count, record, selector_count)?;
            add_row(&mut tidsets, row, record);
            row_count += 1;
        }
        Ok(Self::finish(row_count, tidsets))
    }

    fn finish(row_count: usize, mut tidsets: Vec<GrowableArray<u32>>) -> Self {
        for tidset in tidsets.iter_mut() {
            tidset.shrink_to_fit();
        }
        debug!(rows = row_count, selectors = tidsets.len(), "tidsets built");
        TidsetBase { row_count, tidsets }
    }

    pub fn tidsets(&self) -> &[GrowableArray<u32>] {
        &self.tidsets
    }

    pub fn tidset(&self, selector: u32) -> Option<&[u32]> {
        self.tidsets.get(selector as usize).map(|t| t.as_slice())
    }

    /// Rows containing every selector of `itemset`, intersecting left to right.
    pub fn tidset_for_itemset(&self, itemset: &[u32]) -> Result<Vec<u32>> {
        check_itemset(itemset, self.tidsets.len())?;
        let Some((&first, rest)) = itemset.split_first() else {
            return Ok(Vec::new());
        };
        let mut tids = self.tidsets[first as usize].as_slice().to_vec();
        for &s in rest {
            if tids.is_empty() {
                break;
            }
            tids = intersect(&tids, self.tidsets[s as usize].as_slice());
        }
        Ok(tids)
    }

    pub fn export_tidsets<W: Write>(&self, w: &mut W, labels: Option<&[String]>) -> Result<()> {
        writeln!(w, "------Tidsets------")?;
        for (id, tidset) in self.tidsets.iter().enumerate() {
            write!(w, "{}: {} -> ", id, selector_label(labels, id))?;
            for tid in tidset.iter() {
                write!(w, "{} ", tid)?;
            }
            writeln!(w)?;
        }
        w.flush()?;
        Ok(())
    }
}

impl SupportCount for TidsetBase {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn selector_count(&self) -> usize {
        self.tidsets.len()
    }

    fn support_count(&self, itemset: &[u32]) -> Result<u64> {
        Ok(self.tidset_for_itemset(itemset)?.len() as u64)
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
    fn test_intersect() {
        assert_eq!(intersect(&[0, 2, 4, 7], &[1, 2, 3, 7, 9]), vec![2, 7]);
        assert!(intersect(&[], &[1]).is_empty());
        assert!(intersect(&[1, 3], &[2, 4]).is_empty());
    }

    #[test]
    fn test_build_and_query() {
        let base = TidsetBase::build(&data());
        assert_eq!(base.tidset(0), Some(&[0u32, 2][..]));
        assert_eq!(base.tidset(2), Some(&[0u32, 1, 2][..]));
        assert_eq!(base.tidset(3), None);

        assert_eq!(base.tidset_for_itemset(&[2, 0]).unwrap(), vec![0, 2]);
        assert_eq!(base.support_count(&[0, 1, 2]).unwrap(), 1);
        assert_eq!(base.support_count(&[1, 1]).unwrap(), 2);
        assert_eq!(base.support_count(&[]).unwrap(), 0);
        assert!(matches!(
            base.support_count(&[0, 3]),
            Err(Error::SelectorOutOfRange { selector: 3, .. })
        ));
    }

    #[test]
    fn test_from_record_producer() {
        let data = data();
        let streamed = TidsetBase::from_records(3, data.records().iter().map(|r| r.as_slice())).unwrap();
        let built = TidsetBase::build(&data);
        assert_eq!(streamed.tidsets(), built.tidsets());
        assert_eq!(streamed.row_count(), 4);

        // records produced on the fly, never collected
        let rows = (0..5u32).map(|r| if r % 2 == 0 { vec![0, 1] } else { vec![1] });
        let generated = TidsetBase::from_records(2, rows).unwrap();
        assert_eq!(generated.tidset(0), Some(&[0u32, 2, 4][..]));
        assert_eq!(generated.support_count(&[1]).unwrap(), 5);

        assert!(matches!(
            TidsetBase::from_records(3, vec![vec![2u32, 1]]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TidsetBase::from_records(3, vec![vec![0u32, 3]]),
            Err(Error::SelectorOutOfRange { selector: 3, .. })
        ));
    }

    #[test]
    fn test_tidsets_shrunk() {
        let base = TidsetBase::build(&data());
        for tidset in base.tidsets() {
            assert_eq!(tidset.capacity(), tidset.size());
        }
    }

    #[test]
    fn test_export() {
        let base = TidsetBase::build(&data());
        let mut out = Vec::new();
        base.export_tidsets(&mut out, None).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "------Tidsets------\n0: 0 -> 0 2 \n1: 1 -> 1 2 \n2: 2 -> 0 1 2 \n");
    }
}

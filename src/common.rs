use rayon::prelude::*;

use crate::error::{Error, Result};

/// Rows encoded as ascending selector IDs. A larger selector ID means a more frequent selector,
/// and target selectors always outrank predictive ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedData {
    selector_count: usize,
    records: Vec<Vec<u32>>,
}

impl EncodedData {
    /// Sorts and de-duplicates each record; rejects IDs `>= selector_count` and row counts that
    /// do not fit a `u32` row index.
    pub fn new(selector_count: usize, mut records: Vec<Vec<u32>>) -> Result<Self> {
        check_row_count(records.len())?;
        for record in records.iter_mut() {
            record.sort_unstable();
            record.dedup();
            if let Some(&last) = record.last() {
                check_selector(last, selector_count)?;
            }
        }
        Ok(EncodedData {
            selector_count,
            records,
        })
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn selector_count(&self) -> usize {
        self.selector_count
    }

    #[inline]
    pub fn records(&self) -> &[Vec<u32>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Vec<u32>> {
        self.records
    }

    /// `result[s]` = number of rows containing selector `s`.
    pub fn selector_frequencies(&self) -> Vec<u64> {
        let n = self.selector_count;
        self.records
            .par_iter()
            .fold(
                || vec![0u64; n],
                |mut acc, record| {
                    for &s in record {
                        acc[s as usize] += 1;
                    }
                    acc
                },
            )
            .reduce(
                || vec![0u64; n],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b.iter()) {
                        *x += y;
                    }
                    a
                },
            )
    }
}

#[inline]
pub(crate) fn check_selector(selector: u32, selector_count: usize) -> Result<()> {
    if (selector as usize) < selector_count {
        Ok(())
    } else {
        Err(Error::SelectorOutOfRange {
            selector,
            selector_count,
        })
    }
}

/// Row indices are stored as `u32`.
pub(crate) fn check_row_count(row_count: usize) -> Result<()> {
    if row_count > u32::MAX as usize {
        return Err(Error::invalid_argument(format!(
            "{} rows exceed the {} addressable by a u32 row index",
            row_count,
            u32::MAX
        )));
    }
    Ok(())
}

/// Validate one record from a streaming producer: strictly ascending, in range, and
/// `row` still addressable. Returns the row index.
pub(crate) fn check_streamed_record(row: usize, record: &[u32], selector_count: usize) -> Result<u32> {
    check_row_count(row + 1)?;
    if !record.windows(2).all(|w| w[0] < w[1]) {
        return Err(Error::invalid_argument(format!(
            "record {} is not strictly ascending",
            row
        )));
    }
    if let Some(&last) = record.last() {
        check_selector(last, selector_count)?;
    }
    Ok(row as u32)
}

pub(crate) fn check_itemset(itemset: &[u32], selector_count: usize) -> Result<()> {
    itemset
        .iter()
        .try_for_each(|&s| check_selector(s, selector_count))
}

/// Itemset support counting shared by the Nlist, Tidset and Diffset engines.
///
/// Built structures are read-only, so one engine can serve many readers at once.
pub trait SupportCount: Sync {
    fn row_count(&self) -> usize;

    fn selector_count(&self) -> usize;

    /// Number of rows containing every selector of `itemset`. An empty itemset counts 0.
    fn support_count(&self, itemset: &[u32]) -> Result<u64>;

    /// Batch form of [`SupportCount::support_count`], evaluated in parallel.
    fn support_counts(&self, itemsets: &[Vec<u32>]) -> Result<Vec<u64>> {
        itemsets
            .par_iter()
            .map(|itemset| self.support_count(itemset))
            .collect()
    }
}

/// Labels for export helpers: the selector condition when known, otherwise its ID.
pub(crate) fn selector_label(labels: Option<&[String]>, selector: usize) -> String {
    match labels.and_then(|l| l.get(selector)) {
        Some(label) => label.clone(),
        None => selector.to_string(),
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

const LENGTH_MEAN: f64 = 2.0;
const LENGTH_STD_DEV: f64 = 1.5;
const MAX_LENGTH_DRAWS: usize = 10_000;

/// Standard normal sample (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Itemset length ~ N(2.0, 1.5), redrawn until it falls within `[min_len, max_len]`.
fn random_length(rng: &mut StdRng, min_len: usize, max_len: usize) -> usize {
    for _ in 0..MAX_LENGTH_DRAWS {
        let x = standard_normal(rng) * LENGTH_STD_DEV + LENGTH_MEAN;
        if x >= min_len as f64 && x <= max_len as f64 {
            return x.round() as usize;
        }
    }
    // range far out in the tail
    rng.random_range(min_len..=max_len)
}

/// `length` selectors of `record`: its last (most frequent) one plus distinct random picks
/// from the rest, ascending. `None` when the record is too short.
fn random_itemset(record: &[u32], rng: &mut StdRng, length: usize) -> Option<Vec<u32>> {
    if record.len() < length {
        return None;
    }
    if record.len() == length {
        return Some(record.to_vec());
    }

    let upper = record.len() - 1;
    let mut picked: Vec<usize> = Vec::with_capacity(length);
    while picked.len() + 1 < length {
        let k = rng.random_range(0..upper);
        if !picked.contains(&k) {
            picked.push(k);
        }
    }
    let mut itemset: Vec<u32> = picked.into_iter().map(|k| record[k]).collect();
    itemset.push(record[upper]);
    itemset.sort_unstable();
    Some(itemset)
}

/// `count` reproducible itemsets drawn from `records`, each with non-zero support.
///
/// Itemsets are spread evenly over the records, then topped up from random records.
pub fn gen_random_itemsets(
    records: &[Vec<u32>],
    count: usize,
    min_len: usize,
    max_len: usize,
    seed: u64,
) -> Result<Vec<Vec<u32>>> {
    if min_len == 0 || min_len > max_len {
        return Err(Error::invalid_argument(format!(
            "invalid itemset length range [{}, {}]",
            min_len, max_len
        )));
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    let eligible: Vec<&Vec<u32>> = records.iter().filter(|r| r.len() >= min_len).collect();
    if eligible.is_empty() {
        return Err(Error::invalid_argument(format!(
            "no record holds {} or more selectors",
            min_len
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut itemsets = Vec::with_capacity(count);

    let per_row = count as f64 / records.len().max(1) as f64;
    let floor = per_row.floor();
    let step = if per_row == floor {
        usize::MAX
    } else {
        (1.0 / (per_row - floor)) as usize
    };
    for (i, record) in records.iter().enumerate() {
        let n = floor as usize + usize::from(i % step == 0);
        for _ in 0..n {
            let length = random_length(&mut rng, min_len, max_len);
            if let Some(itemset) = random_itemset(record, &mut rng, length) {
                if itemsets.len() < count {
                    itemsets.push(itemset);
                }
            }
        }
    }

    while itemsets.len() < count {
        let record = eligible[rng.random_range(0..eligible.len())];
        let length = random_length(&mut rng, min_len, max_len);
        if let Some(itemset) = random_itemset(record, &mut rng, length) {
            itemsets.push(itemset);
        }
    }
    Ok(itemsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<Vec<u32>> {
        (0..50u32)
            .map(|r| (0..10u32).filter(|s| (r + s) % 3 != 0).collect())
            .collect()
    }

    #[test]
    fn test_reproducible() {
        let records = records();
        let a = gen_random_itemsets(&records, 500, 2, 6, 7).unwrap();
        let b = gen_random_itemsets(&records, 500, 2, 6, 7).unwrap();
        let c = gen_random_itemsets(&records, 500, 2, 6, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_itemsets_come_from_records() {
        let records = records();
        let itemsets = gen_random_itemsets(&records, 321, 2, 8, 42).unwrap();
        assert_eq!(itemsets.len(), 321);
        for itemset in &itemsets {
            assert!((2..=8).contains(&itemset.len()));
            assert!(itemset.windows(2).all(|w| w[0] < w[1]));
            assert!(records
                .iter()
                .any(|r| itemset.iter().all(|s| r.contains(s)) && r.last() == itemset.last()));
        }
    }

    #[test]
    fn test_invalid_arguments() {
        let records = records();
        assert!(gen_random_itemsets(&records, 10, 0, 3, 1).is_err());
        assert!(gen_random_itemsets(&records, 10, 4, 3, 1).is_err());
        assert!(gen_random_itemsets(&records, 10, 11, 12, 1).is_err());
        assert!(gen_random_itemsets(&records, 0, 11, 12, 1).unwrap().is_empty());
    }
}

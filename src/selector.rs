//! Selector identities for categorical rows.
//!
//! Selector IDs are dense in `[0, selector_count)` and ascend with frequency inside two groups:
//! frequent predictive selectors first, then every target selector. A larger ID therefore means
//! a more frequent selector, and any target selector outranks any predictive one.

use ahash::AHashMap;

use crate::common::EncodedData;
use crate::error::{Error, Result};

/// A categorical `(attribute, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub attribute_id: usize,
    pub attribute_name: String,
    pub distinct_value: String,
    /// Position among all predictive values, then all target values, each ascending by
    /// frequency. Assigned regardless of the support filter.
    pub distinct_value_id: u32,
    pub frequency: u64,
    /// `attribute=value`
    pub condition: String,
    /// `None` when the selector failed the minimum-support filter.
    pub selector_id: Option<u32>,
}

impl Selector {
    fn new(attribute_id: usize, attribute_name: &str, value: &str, distinct_value_id: u32) -> Self {
        Selector {
            attribute_id,
            attribute_name: attribute_name.to_string(),
            distinct_value: value.to_string(),
            distinct_value_id,
            frequency: 0,
            condition: format!("{}={}", attribute_name, value),
            selector_id: None,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.selector_id.is_some()
    }
}

pub struct SelectorEncoder {
    /// All distinct values, indexed by `distinct_value_id`.
    selectors: Vec<Selector>,
    /// Per attribute: value -> distinct_value_id.
    value_maps: Vec<AHashMap<String, u32>>,
    /// Valid selectors ordered by selector ID (indices into `selectors`).
    constructing: Vec<usize>,
    predictive_selector_count: usize,
}

impl SelectorEncoder {
    /// Count every distinct value and assign selector IDs.
    ///
    /// The last `target_attr_count` attributes are targets. Predictive selectors need
    /// `frequency >= min_sup_count`; target selectors are always kept.
    pub fn fit<S: AsRef<str>>(
        attribute_names: &[S],
        rows: &[Vec<S>],
        target_attr_count: usize,
        min_sup_count: u64,
    ) -> Result<Self> {
        let attr_count = attribute_names.len();
        if target_attr_count > attr_count {
            return Err(Error::invalid_argument(format!(
                "{} target attributes requested but only {} attributes exist",
                target_attr_count, attr_count
            )));
        }

        let mut selectors: Vec<Selector> = Vec::new();
        let mut value_maps: Vec<AHashMap<String, u32>> = vec![AHashMap::new(); attr_count];

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != attr_count {
                return Err(Error::invalid_argument(format!(
                    "row {} has {} values, expected {}",
                    row_idx,
                    row.len(),
                    attr_count
                )));
            }
            for (attr, value) in row.iter().enumerate() {
                let value = value.as_ref();
                let id = match value_maps[attr].get(value) {
                    Some(&id) => id,
                    None => {
                        let id = selectors.len() as u32;
                        selectors.push(Selector::new(attr, attribute_names[attr].as_ref(), value, id));
                        value_maps[attr].insert(value.to_string(), id);
                        id
                    }
                };
                selectors[id as usize].frequency += 1;
            }
        }

        // Positions in `selectors` are first-appearance order and break frequency ties.
        let first_target = attr_count - target_attr_count;
        let by_frequency = |a: &usize, b: &usize| {
            selectors[*a]
                .frequency
                .cmp(&selectors[*b].frequency)
                .then(a.cmp(b))
        };
        let mut order: Vec<usize> = (0..selectors.len())
            .filter(|&i| selectors[i].attribute_id < first_target)
            .collect();
        order.sort_unstable_by(by_frequency);
        let predictive_len = order.len();
        let mut targets: Vec<usize> = (0..selectors.len())
            .filter(|&i| selectors[i].attribute_id >= first_target)
            .collect();
        targets.sort_unstable_by(by_frequency);
        order.extend(targets);

        // distinct_value_id: position among all predictive values, then all target values,
        // each ascending by frequency
        let mut remap = vec![0u32; selectors.len()];
        for (position, &first_seen) in order.iter().enumerate() {
            remap[first_seen] = position as u32;
        }
        let mut slots: Vec<Option<Selector>> = selectors.into_iter().map(Some).collect();
        let mut selectors: Vec<Selector> = order.iter().filter_map(|&i| slots[i].take()).collect();
        for (position, selector) in selectors.iter_mut().enumerate() {
            selector.distinct_value_id = position as u32;
        }
        for map in value_maps.iter_mut() {
            for id in map.values_mut() {
                *id = remap[*id as usize];
            }
        }

        let constructing: Vec<usize> = (0..predictive_len)
            .filter(|&i| selectors[i].frequency >= min_sup_count)
            .chain(predictive_len..selectors.len())
            .collect();
        let predictive_selector_count = constructing.len() - (selectors.len() - predictive_len);
        for (selector_id, &i) in constructing.iter().enumerate() {
            selectors[i].selector_id = Some(selector_id as u32);
        }

        tracing::debug!(
            distinct_values = selectors.len(),
            selector_count = constructing.len(),
            predictive_selector_count,
            "selector IDs assigned"
        );

        Ok(SelectorEncoder {
            selectors,
            value_maps,
            constructing,
            predictive_selector_count,
        })
    }

    /// Number of valid selectors, i.e. the selector ID domain.
    pub fn selector_count(&self) -> usize {
        self.constructing.len()
    }

    pub fn predictive_selector_count(&self) -> usize {
        self.predictive_selector_count
    }

    pub fn target_selector_count(&self) -> usize {
        self.constructing.len() - self.predictive_selector_count
    }

    /// Every distinct value seen, valid or not, in `distinct_value_id` order.
    pub fn distinct_values(&self) -> &[Selector] {
        &self.selectors
    }

    /// Valid selectors in selector ID order.
    pub fn constructing_selectors(&self) -> impl Iterator<Item = &Selector> + '_ {
        self.constructing.iter().map(move |&i| &self.selectors[i])
    }

    pub fn selector(&self, selector_id: u32) -> Option<&Selector> {
        self.constructing
            .get(selector_id as usize)
            .map(|&i| &self.selectors[i])
    }

    /// Conditions in selector ID order, for export labels.
    pub fn conditions(&self) -> Vec<String> {
        self.constructing_selectors().map(|s| s.condition.clone()).collect()
    }

    /// Selector ID of `value` for attribute `attr`, if it exists and passed the filter.
    pub fn selector_id(&self, attr: usize, value: &str) -> Option<u32> {
        let id = *self.value_maps.get(attr)?.get(value)?;
        self.selectors[id as usize].selector_id
    }

    /// Encode one row into ascending selector IDs, dropping unknown and invalid values.
    pub fn encode_row<S: AsRef<str>>(&self, row: &[S]) -> Vec<u32> {
        let mut record: Vec<u32> = row
            .iter()
            .enumerate()
            .filter_map(|(attr, value)| self.selector_id(attr, value.as_ref()))
            .collect();
        record.sort_unstable();
        record
    }

    pub fn encode<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Result<EncodedData> {
        let records = rows.iter().map(|row| self.encode_row(row)).collect();
        EncodedData::new(self.selector_count(), records)
    }
}

use crate::error::{Error, Result};

pub const DEFAULT_EFFICIENCY: usize = 1000;

/// Knobs for tree construction.
///
/// `efficiency` splits the partitioned build: a frontier leaf stops growing once it holds at
/// most `row_count / efficiency` rows. Larger values give a smaller top part and more, smaller
/// subtrees, trading time for peak memory.
///
/// `node_budget` caps the number of resident tree nodes. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub efficiency: usize,
    pub node_budget: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            efficiency: DEFAULT_EFFICIENCY,
            node_budget: None,
        }
    }
}

impl BuildConfig {
    pub fn new(efficiency: usize) -> Self {
        Self {
            efficiency,
            node_budget: None,
        }
    }

    pub fn with_efficiency(mut self, efficiency: usize) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn with_node_budget(mut self, max_nodes: usize) -> Self {
        self.node_budget = Some(max_nodes);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.efficiency == 0 {
            return Err(Error::InvalidEfficiency(self.efficiency));
        }
        Ok(())
    }

    /// Largest number of rows a frontier leaf may keep for its subtree.
    pub fn max_instance_count(&self, row_count: usize) -> usize {
        row_count / self.efficiency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.efficiency, 1000);
        assert_eq!(config.node_budget, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_efficiency_rejected() {
        let config = BuildConfig::default().with_efficiency(0);
        assert!(matches!(config.validate(), Err(Error::InvalidEfficiency(0))));
    }

    #[test]
    fn test_max_instance_count() {
        let config = BuildConfig::new(10).with_node_budget(64);
        assert_eq!(config.max_instance_count(1005), 100);
        assert_eq!(config.max_instance_count(9), 0);
        assert_eq!(config.node_budget, Some(64));
    }
}

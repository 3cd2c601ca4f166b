//! Runtime knobs for the buffer algorithms in [`crate::algs`].

use crate::hyperslab_error::HyperslabError;

/// I/O vector size used when nothing else is configured.
pub const DEFAULT_MAX_RUNS: usize = 1024;

/// Batch limits applied each time a buffer algorithm asks the sequence
/// generator for more runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Most runs produced per batch.
    pub max_runs: usize,
    /// Most elements covered per batch.
    pub max_elements: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_runs: DEFAULT_MAX_RUNS,
            max_elements: u64::MAX,
        }
    }
}

impl IoConfig {
    /// # Errors
    /// `InvalidArgument` if either limit is zero: no batch could make
    /// progress.
    pub fn validate(&self) -> Result<(), HyperslabError> {
        if self.max_runs == 0 {
            return Err(HyperslabError::invalid("max_runs must be at least 1"));
        }
        if self.max_elements == 0 {
            return Err(HyperslabError::invalid("max_elements must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_validation() {
        let cfg = IoConfig::default();
        assert_eq!(cfg.max_runs, 1024);
        assert!(cfg.validate().is_ok());
        let bad = IoConfig {
            max_runs: 0,
            ..cfg
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: IoConfig = serde_json::from_str(r#"{"max_runs": 8}"#).unwrap();
        assert_eq!(cfg.max_runs, 8);
        assert_eq!(cfg.max_elements, u64::MAX);
    }
}

//! CAS configuration.

use serde::{Deserialize, Serialize};

use crate::error::CasError;

/// Default initial size of the main heap in cells.
pub const DEFAULT_INITIAL_HEAP_SIZE: usize = 500_000;

/// Default high-water mark above which `reset` shrinks the heap.
pub const DEFAULT_RESET_HEAP_SIZE: usize = 5_000_000;

/// Default initial size of each auxiliary heap in elements.
pub const DEFAULT_INITIAL_AUX_HEAP_SIZE: usize = 1024;

/// CAS configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CasConfig {
    /// Initial main heap size in cells
    pub initial_heap_size: usize,
    /// Heap size in cells above which a reset shrinks storage back to the initial size
    pub reset_heap_size: usize,
    /// Initial capacity of the string, byte, short and long heaps
    pub initial_aux_heap_size: usize,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            initial_heap_size: DEFAULT_INITIAL_HEAP_SIZE,
            reset_heap_size: DEFAULT_RESET_HEAP_SIZE,
            initial_aux_heap_size: DEFAULT_INITIAL_AUX_HEAP_SIZE,
        }
    }
}

impl CasConfig {
    /// Checks that the sizes are usable.
    pub fn validate(&self) -> Result<(), CasError> {
        if self.initial_heap_size < 2 {
            return Err(CasError::InvalidConfig(format!(
                "initial_heap_size must be at least 2, got {}",
                self.initial_heap_size
            )));
        }
        if self.reset_heap_size < self.initial_heap_size {
            return Err(CasError::InvalidConfig(format!(
                "reset_heap_size ({}) must not be below initial_heap_size ({})",
                self.reset_heap_size, self.initial_heap_size
            )));
        }
        if self.initial_aux_heap_size == 0 {
            return Err(CasError::InvalidConfig(
                "initial_aux_heap_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, CasError> {
        let config: CasConfig = serde_json::from_str(json)
            .map_err(|e| CasError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CasConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_heap_size, 500_000);
        assert_eq!(config.reset_heap_size, 5_000_000);
    }

    #[test]
    fn test_threshold_below_initial_rejected() {
        let config = CasConfig {
            initial_heap_size: 1000,
            reset_heap_size: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CasError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_partial() {
        let config = CasConfig::from_json(r#"{ "reset_heap_size": 900000 }"#).unwrap();
        assert_eq!(config.reset_heap_size, 900_000);
        assert_eq!(config.initial_heap_size, DEFAULT_INITIAL_HEAP_SIZE);
    }
}

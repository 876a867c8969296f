//! World tuning parameters.
//!
//! Every field has a default, so a configuration file only needs to name
//! what it changes:
//!
//! ```
//! use ember_world::config::WorldConfig;
//!
//! let config = WorldConfig::from_json_str(r#"{ "spatial_threshold": 200 }"#).unwrap();
//! assert_eq!(config.spatial_threshold, 200);
//! assert_eq!(config.pool_capacity, 512);
//! ```

use serde::{Deserialize, Serialize};

use crate::spatial::SpatialConfig;
use crate::WorldError;

/// Configuration for a [`World`](crate::world::World).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Slots the object pool builds up front.
    pub pool_capacity: usize,
    /// Live population at or above which candidates are culled against the
    /// camera through the spatial index.
    pub spatial_threshold: usize,
    /// Fraction of the viewport size added on every side of the camera
    /// query.
    pub viewport_padding: f32,
    /// Quad tree split policy.
    pub spatial: SpatialConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 512,
            spatial_threshold: 50,
            viewport_padding: 0.1,
            spatial: SpatialConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// [`WorldError::ConfigParse`] for malformed JSON,
    /// [`WorldError::InvalidConfig`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, WorldError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`WorldError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<(), WorldError> {
        if !self.viewport_padding.is_finite() || self.viewport_padding < 0.0 {
            return Err(WorldError::InvalidConfig {
                field: "viewport_padding",
                reason: format!("must be finite and >= 0, got {}", self.viewport_padding),
            });
        }
        if self.spatial.max_objects == 0 {
            return Err(WorldError::InvalidConfig {
                field: "spatial.max_objects",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

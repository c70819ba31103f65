use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub surface: SurfaceConfig,
}

impl AppConfig {
    /// Parses a configuration document. Missing sections fall back to their
    /// defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Inclusive range a parameter is clamped into before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min.min(self.max), self.max.max(self.min))
    }
}

/// Configuration specific to the host bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Ask the host to push its parameter set when the bridge connects.
    pub request_initial_state: bool,
    pub parameter_ranges: BTreeMap<String, ParameterRange>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let mut parameter_ranges = BTreeMap::new();
        parameter_ranges.insert("delayAdjust".to_string(), ParameterRange::new(-4096.0, 4096.0));
        parameter_ranges.insert("colorTheme".to_string(), ParameterRange::new(0.0, 6.0));
        Self {
            request_initial_state: true,
            parameter_ranges,
        }
    }
}

impl BridgeConfig {
    pub fn range_for(&self, id: &str) -> Option<ParameterRange> {
        self.parameter_ranges.get(id).copied()
    }
}

/// Geometry and thresholds of the circular slice surface, in pointer units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurfaceConfig {
    /// Edge length of the square surface. The center sits at `size / 2` on
    /// both axes and the half-extent is the normalising radius.
    pub size: f64,
    pub inner_radius_ratio: f64,
    pub outer_radius_ratio: f64,
    /// Center-hub release distance above which a drag counts as a swipe.
    pub swipe_threshold: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            size: 400.0,
            inner_radius_ratio: 0.40,
            outer_radius_ratio: 0.98,
            swipe_threshold: 90.0,
        }
    }
}

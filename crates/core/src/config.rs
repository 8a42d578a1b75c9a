//! Pipeline configuration.
//!
//! `PipelineConfig` is plain serde data. [`PipelineConfig::from_json`] is the
//! lenient loader used by the CLI: each key that is missing or has the wrong
//! type falls back to its default, and [`PipelineConfig::validate`] then
//! rejects values the pipeline cannot run with.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RenderError;

pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 1500;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_WORKER_NAME: &str = "render-worker";

/// Settings for one render pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Pending tasks the scheduler queue holds before `submit` blocks.
    pub queue_capacity: usize,
    /// Name given to the worker thread.
    pub worker_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            worker_name: DEFAULT_WORKER_NAME.to_owned(),
        }
    }
}

/// Extracts a `u32` from `params[name]`, returning `default` if missing,
/// the wrong type, or out of range.
fn param_u32(params: &Value, name: &str, default: u32) -> u32 {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

/// Extracts a `usize` from `params[name]`, returning `default` if missing or
/// the wrong type.
fn param_usize(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Extracts a `String` from `params[name]`, returning `default` if missing
/// or the wrong type.
fn param_string(params: &Value, name: &str, default: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| default.to_owned())
}

impl PipelineConfig {
    /// Builds a config from a JSON object, defaulting every unusable key.
    pub fn from_json(params: &Value) -> Self {
        let defaults = Self::default();
        Self {
            width: param_u32(params, "width", defaults.width),
            height: param_u32(params, "height", defaults.height),
            queue_capacity: param_usize(params, "queue_capacity", defaults.queue_capacity),
            worker_name: param_string(params, "worker_name", &defaults.worker_name),
        }
    }

    /// Returns a copy with the given dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// # Errors
    ///
    /// `RenderError::InvalidDimensions` for a zero dimension,
    /// `RenderError::InvalidConfig` for a zero queue capacity or an empty
    /// worker name.
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.queue_capacity == 0 {
            return Err(RenderError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.worker_name.trim().is_empty() {
            return Err(RenderError::InvalidConfig(
                "worker_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

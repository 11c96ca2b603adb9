//! Detected frame regions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A pixel-space rectangle in the source frame, optionally bounded in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// What was detected ("face", "license_plate", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// First second the region is visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Last second the region is visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            label: None,
            start: None,
            end: None,
        }
    }

    pub fn with_window(mut self, start: f64, end: f64) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

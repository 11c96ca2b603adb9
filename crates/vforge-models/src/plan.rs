//! Subscription plan tiers.

use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Studio,
}

impl PlanTier {
    /// Parse from string (case-insensitive). Unknown values map to `Free`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pro" => PlanTier::Pro,
            "studio" => PlanTier::Studio,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Studio => "studio",
        }
    }

    /// Parse a comma-separated tier list such as `"pro,studio"`.
    pub fn parse_set(list: &str) -> HashSet<PlanTier> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PlanTier::parse)
            .collect()
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

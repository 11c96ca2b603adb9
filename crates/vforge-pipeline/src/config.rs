//! Pipeline configuration.

use std::collections::HashSet;
use std::path::PathBuf;

use vforge_models::PlanTier;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for per-request working directories
    pub work_dir: PathBuf,
    /// Delete ephemeral artifacts after fan-out
    pub cleanup_enabled: bool,
    /// Plans allowed to submit processing requests
    pub elevated_tiers: HashSet<PlanTier>,
    /// Prefix prepended to every storage folder
    pub storage_prefix: String,
    /// Upload each stage output as a preview for realtime sessions
    pub preview_uploads: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vforge"),
            cleanup_enabled: false,
            elevated_tiers: PlanTier::parse_set("pro,studio"),
            storage_prefix: String::new(),
            preview_uploads: true,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let production = std::env::var("ENVIRONMENT")
            .map(|e| e.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Self {
            work_dir: std::env::var("PIPELINE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/vforge")),
            cleanup_enabled: std::env::var("PIPELINE_CLEANUP")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(production),
            elevated_tiers: std::env::var("ELEVATED_TIERS")
                .map(|v| PlanTier::parse_set(&v))
                .ok()
                .filter(|tiers| !tiers.is_empty())
                .unwrap_or_else(|| PlanTier::parse_set("pro,studio")),
            storage_prefix: std::env::var("STORAGE_FOLDER_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_default(),
            preview_uploads: std::env::var("PREVIEW_UPLOADS")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }

    /// Storage folder under the configured prefix.
    pub fn folder(&self, name: &str) -> String {
        if self.storage_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.storage_prefix, name)
        }
    }

    pub fn is_elevated(&self, plan: PlanTier) -> bool {
        self.elevated_tiers.contains(&plan)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(!config.cleanup_enabled);
        assert!(config.is_elevated(PlanTier::Pro));
        assert!(config.is_elevated(PlanTier::Studio));
        assert!(!config.is_elevated(PlanTier::Free));
    }

    #[test]
    fn test_folder_prefix() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.folder("videos"), "videos");
        config.storage_prefix = "staging".into();
        assert_eq!(config.folder("videos"), "staging/videos");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}

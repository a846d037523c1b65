use crate::error::{Result, SegmentError};
use serde::{Deserialize, Serialize};

/// Configuration for segmentation behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// What to do with a comment/string literal that never closes
    pub unterminated_region: UnterminatedPolicy,

    /// Inputs larger than this are rejected (bytes)
    pub max_input_bytes: usize,

    /// Blocks nested deeper than this are emitted without descending
    pub max_depth: usize,

    /// Run the call-expression correction pass
    pub correct_calls: bool,

    /// Report `function` inside class/trait/interface bodies as methods
    pub classify_methods: bool,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            unterminated_region: UnterminatedPolicy::ExtendToEnd,
            max_input_bytes: 16 * 1024 * 1024,
            max_depth: 256,
            correct_calls: true,
            classify_methods: true,
        }
    }
}

impl SegmenterConfig {
    /// Refuse input with unterminated comments or strings
    pub fn strict() -> Self {
        Self {
            unterminated_region: UnterminatedPolicy::Abort,
            ..Default::default()
        }
    }

    /// Accept anything, report problems as diagnostics
    pub fn lenient() -> Self {
        Self {
            unterminated_region: UnterminatedPolicy::ExtendToEnd,
            max_input_bytes: usize::MAX,
            ..Default::default()
        }
    }

    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| SegmentError::config_parse(format!("segmenter config: {e}")))?;
        config.validate().map_err(SegmentError::invalid_config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_input_bytes == 0 {
            return Err("max_input_bytes must be > 0".to_string());
        }

        if self.max_depth == 0 {
            return Err("max_depth must be > 0".to_string());
        }

        Ok(())
    }
}

/// Handling of a comment or string literal with no closer before end of input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnterminatedPolicy {
    /// Treat the rest of the buffer as inside the region and report it
    #[default]
    ExtendToEnd,

    /// Fail the whole call
    Abort,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SegmenterConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs_valid() {
        assert!(SegmenterConfig::strict().validate().is_ok());
        assert!(SegmenterConfig::lenient().validate().is_ok());
        assert_eq!(
            SegmenterConfig::strict().unterminated_region,
            UnterminatedPolicy::Abort
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = SegmenterConfig::default();

        config.max_depth = 0;
        assert!(config.validate().is_err());

        config.max_depth = 4;
        config.max_input_bytes = 0;
        assert!(config.validate().is_err());

        config.max_input_bytes = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SegmenterConfig::from_toml_str(
            r#"
unterminated_region = "abort"
max_depth = 8
"#,
        )
        .unwrap();

        assert_eq!(config.unterminated_region, UnterminatedPolicy::Abort);
        assert_eq!(config.max_depth, 8);
        assert!(config.correct_calls);
    }

    #[test]
    fn test_from_toml_rejects_invalid() {
        assert!(matches!(
            SegmenterConfig::from_toml_str("max_depth = 0"),
            Err(SegmentError::InvalidConfig(_))
        ));
        assert!(matches!(
            SegmenterConfig::from_toml_str("max_depth = \"deep\""),
            Err(SegmentError::ConfigParse(_))
        ));
    }
}

use crate::regions::RegionKind;
use thiserror::Error;

/// Result type for segmentation operations
pub type Result<T> = std::result::Result<T, SegmentError>;

/// Errors that abort a segmentation call
///
/// Anomalies the segmenter can recover from (unterminated commands, dangling
/// markers, over-deep nesting) are reported as [`crate::Diagnostic`] values
/// instead.
#[derive(Error, Debug)]
pub enum SegmentError {
    /// A comment or string literal never closes and the policy is `Abort`
    #[error("Unterminated {kind} starting at byte {start}")]
    UnterminatedRegion { kind: RegionKind, start: usize },

    /// Input exceeds the configured size bound
    #[error("Input too large: {len} bytes (limit {max})")]
    InputTooLarge { len: usize, max: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rule table violates opener/closer semantics
    #[error("Invalid rule table: {0}")]
    InvalidRules(String),

    /// Config or rule table document could not be decoded
    #[error("Failed to parse {0}")]
    ConfigParse(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SegmentError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid rule table error
    pub fn invalid_rules(msg: impl Into<String>) -> Self {
        Self::InvalidRules(msg.into())
    }

    /// Create a decode error
    pub fn config_parse(msg: impl Into<String>) -> Self {
        Self::ConfigParse(msg.into())
    }
}

use crate::candidates::CandidateScanner;
use crate::closer::Nesting;
use crate::config::{SegmenterConfig, UnterminatedPolicy};
use crate::correction::correct_calls;
use crate::descender::Descender;
use crate::error::{Result, SegmentError};
use crate::matcher::OpenerMatcher;
use crate::regions::Masks;
use crate::rules::RuleTable;
use crate::types::{Diagnostic, Segmentation};
use std::path::Path;

/// Segment `source` with `rules` and the default configuration
pub fn segment(source: &str, rules: &RuleTable) -> Result<Segmentation> {
    Segmenter::new(SegmenterConfig::default(), rules.clone())?.segment(source)
}

/// Main segmenter interface: a validated rule table plus configuration
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmenterConfig,
    rules: RuleTable,
    matcher: OpenerMatcher,
}

impl Default for Segmenter {
    fn default() -> Self {
        let rules = RuleTable::c_like();
        Self {
            config: SegmenterConfig::default(),
            matcher: OpenerMatcher::new(&rules),
            rules,
        }
    }
}

impl Segmenter {
    /// Create a segmenter, rejecting invalid configuration or rules
    pub fn new(config: SegmenterConfig, rules: RuleTable) -> Result<Self> {
        config.validate().map_err(SegmentError::invalid_config)?;
        rules.validate()?;

        Ok(Self {
            config,
            matcher: OpenerMatcher::new(&rules),
            rules,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    #[must_use]
    pub const fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Segment a file read from disk
    pub fn segment_file(&self, path: impl AsRef<Path>) -> Result<Segmentation> {
        let content = std::fs::read_to_string(path)?;
        self.segment(&content)
    }

    /// Partition `source` into commands
    ///
    /// Offsets in the result refer to `source` as given. Empty or
    /// whitespace-only input yields an empty segmentation.
    pub fn segment(&self, source: &str) -> Result<Segmentation> {
        if source.len() > self.config.max_input_bytes {
            return Err(SegmentError::InputTooLarge {
                len: source.len(),
                max: self.config.max_input_bytes,
            });
        }
        if source.trim().is_empty() {
            return Ok(Segmentation::default());
        }

        let masks = Masks::scan(source, &self.rules);
        let mut diagnostics = Vec::new();
        for region in masks.unterminated() {
            if self.config.unterminated_region == UnterminatedPolicy::Abort {
                return Err(SegmentError::UnterminatedRegion {
                    kind: region.kind,
                    start: region.start,
                });
            }
            log::warn!(
                "unterminated {} at byte {}, masking to end of input",
                region.kind,
                region.start
            );
            diagnostics.push(Diagnostic::UnterminatedRegion {
                kind: region.kind,
                start: region.start,
            });
        }

        let nesting = Nesting::build(source, &masks, &self.rules);
        let mut scanned =
            CandidateScanner::new(source, &self.rules, &self.matcher, &masks, &nesting).scan();

        if self.config.correct_calls {
            match self.rules.call_rule() {
                Some(call_rule) => {
                    let corrected = correct_calls(
                        source,
                        &masks,
                        &nesting,
                        &self.matcher,
                        call_rule,
                        &mut scanned,
                    );
                    log::debug!("call correction: {corrected} call statement(s) re-rooted");
                }
                None => log::debug!("call correction skipped: rule table has no call rule"),
            }
        }

        let (commands, descent_diagnostics) =
            Descender::new(source, &nesting, &self.config, scanned.candidates).run();
        diagnostics.extend(descent_diagnostics);

        log::debug!(
            "segmented {} bytes into {} commands ({} diagnostics)",
            source.len(),
            commands.len(),
            diagnostics.len()
        );

        Ok(Segmentation {
            commands,
            diagnostics,
        })
    }
}

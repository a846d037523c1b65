//! # Command Segmenter
//!
//! Rule-driven statement segmentation for C-like source text.
//!
//! ## Philosophy
//!
//! The segmenter partitions raw source into *commands* (statements,
//! declarations, blocks) using lexical information only:
//! - Openers and closers inside comments and string literals never count
//! - Block bodies are segmented recursively, into the same flat result
//! - Call statements are never fragmented by rules firing on their arguments
//! - Malformed input degrades into diagnostics, not errors
//!
//! It is a heuristic segmenter, not a parser: there is no expression tree and
//! no semantic analysis.
//!
//! ## Architecture
//!
//! ```text
//! Source Text + RuleTable
//!     │
//!     ├──> Region Scanner → comment / string-literal masks
//!     │
//!     ├──> Nesting → bracket groups + unmasked closer positions
//!     │
//!     ├──> Candidate Scanner
//!     │    ├─> Block headers (opener … sub-block opener)
//!     │    └─> Position-keyed candidates, later rules win ties
//!     │
//!     ├──> Correction Pass → re-root candidates swallowed by `name(...);`
//!     │
//!     └──> Block Descender
//!          ├─> Markers prefix the next real command
//!          ├─> Closer resolution outside masks and nested brackets
//!          └─> Emit Command[] (children before their block) + Diagnostic[]
//! ```
//!
//! ## Example
//!
//! ```rust
//! use command_segmenter::{Segmenter, StatementKind};
//!
//! let source = "public function f() { if (true) { return 1; } }";
//! let result = Segmenter::default().segment(source).unwrap();
//!
//! assert_eq!(
//!     result.kinds(),
//!     vec![StatementKind::Return, StatementKind::If, StatementKind::Function]
//! );
//! assert_eq!(result.commands[2].start, 0);
//! ```

mod candidates;
mod closer;
mod config;
mod correction;
mod descender;
mod error;
mod lines;
mod matcher;
mod regions;
mod rules;
mod segmenter;
mod types;

pub use config::{SegmenterConfig, UnterminatedPolicy};
pub use error::{Result, SegmentError};
pub use regions::{Region, RegionKind};
pub use rules::{RuleTable, StatementKind, SyntaxRule, Token};
pub use segmenter::{segment, Segmenter};
pub use types::{Command, CommandNode, CommandTree, Diagnostic, Segmentation};

use crate::regions::RegionKind;
use crate::rules::StatementKind;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A finalized statement, declaration or block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    /// Byte offset of the first character (earliest absorbed marker included)
    pub start: usize,

    /// Byte offset just past the closer
    pub end: usize,

    /// The source text `[start, end)`
    pub text: String,

    pub kind: StatementKind,

    /// Whether the command owns a body that was segmented too
    pub has_sub_block: bool,

    /// Nesting depth (0 = top level)
    pub depth: usize,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,
}

impl Command {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    #[must_use]
    pub const fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Check if `other` lies within this command's span
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Text with surrounding whitespace removed
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }
}

/// Non-fatal anomaly met while segmenting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A comment or string literal runs to end of input
    UnterminatedRegion { kind: RegionKind, start: usize },

    /// A candidate's closer was not found inside its enclosing range
    UnterminatedCommand { kind: StatementKind, start: usize },

    /// A marker with no closer-bearing candidate after it in its block
    DanglingMarker { kind: StatementKind, start: usize },

    /// A block nested deeper than the configured limit, kept whole
    DepthLimit {
        kind: StatementKind,
        start: usize,
        depth: usize,
    },
}

impl Diagnostic {
    #[must_use]
    pub const fn start(&self) -> usize {
        match self {
            Self::UnterminatedRegion { start, .. }
            | Self::UnterminatedCommand { start, .. }
            | Self::DanglingMarker { start, .. }
            | Self::DepthLimit { start, .. } => *start,
        }
    }

    #[must_use]
    pub const fn is_unterminated(&self) -> bool {
        matches!(
            self,
            Self::UnterminatedRegion { .. } | Self::UnterminatedCommand { .. }
        )
    }
}

/// Outcome of one segmentation call
///
/// `commands` is flat: nested commands come before the block that encloses
/// them. Use [`CommandTree::build`] to recover the nesting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segmentation {
    pub commands: Vec<Command>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Segmentation {
    /// No unterminated regions or commands were met
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_unterminated)
    }

    /// Number of candidates dropped for lack of a closer
    #[must_use]
    pub fn unterminated_commands(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::UnterminatedCommand { .. }))
            .count()
    }

    /// Depth-0 commands, in source order
    pub fn top_level(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|command| command.depth == 0)
    }

    pub fn kinds(&self) -> Vec<StatementKind> {
        self.commands.iter().map(|command| command.kind).collect()
    }
}

/// One node of a [`CommandTree`]
#[derive(Debug, Clone)]
pub struct CommandNode<'a> {
    pub command: &'a Command,
    /// Indices into [`CommandTree::nodes`], in source order
    pub children: Vec<usize>,
}

/// Nesting of a flat command list, rebuilt from span containment
#[derive(Debug, Clone, Default)]
pub struct CommandTree<'a> {
    pub nodes: Vec<CommandNode<'a>>,
    /// Indices of commands not contained in any other, in source order
    pub roots: Vec<usize>,
}

impl<'a> CommandTree<'a> {
    pub fn build(commands: &'a [Command]) -> Self {
        let mut order: Vec<&Command> = commands.iter().collect();
        order.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.end.cmp(&a.end)));

        let mut tree = Self::default();
        let mut open: Vec<usize> = Vec::new();

        for command in order {
            while let Some(&top) = open.last() {
                if tree.nodes[top].command.contains(command) {
                    break;
                }
                open.pop();
            }

            let index = tree.nodes.len();
            tree.nodes.push(CommandNode {
                command,
                children: Vec::new(),
            });
            match open.last() {
                Some(&parent) => tree.nodes[parent].children.push(index),
                None => tree.roots.push(index),
            }
            open.push(index);
        }

        tree
    }

    /// Depth-first walk in source order, calling `visit(command, depth)`
    pub fn walk(&self, mut visit: impl FnMut(&'a Command, usize)) {
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&i| (i, 0)).collect();

        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            visit(node.command, depth);
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(start: usize, end: usize, kind: StatementKind) -> Command {
        Command {
            start,
            end,
            text: String::new(),
            kind,
            has_sub_block: false,
            depth: 0,
            start_line: 1,
            end_line: 1,
        }
    }

    #[test]
    fn test_command_span_helpers() {
        let outer = command(0, 20, StatementKind::Function);
        let inner = command(5, 10, StatementKind::Return);
        assert_eq!(outer.len(), 20);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert_eq!(inner.span(), 5..10);
    }

    #[test]
    fn test_tree_from_post_order() {
        let commands = vec![
            command(14, 23, StatementKind::Return),
            command(5, 25, StatementKind::If),
            command(0, 27, StatementKind::Function),
            command(28, 35, StatementKind::Variable),
        ];
        let tree = CommandTree::build(&commands);

        assert_eq!(tree.roots.len(), 2);
        let mut seen = Vec::new();
        tree.walk(|command, depth| seen.push((command.kind, depth)));
        assert_eq!(
            seen,
            vec![
                (StatementKind::Function, 0),
                (StatementKind::If, 1),
                (StatementKind::Return, 2),
                (StatementKind::Variable, 0),
            ]
        );
    }

    #[test]
    fn test_diagnostic_serialization() {
        let diagnostic = Diagnostic::UnterminatedCommand {
            kind: StatementKind::Variable,
            start: 3,
        };
        let json = serde_json::to_value(diagnostic).unwrap();
        assert_eq!(json["type"], "unterminated_command");
        assert_eq!(json["kind"], "variable");
        assert_eq!(diagnostic.start(), 3);
        assert!(diagnostic.is_unterminated());
    }
}

use crate::candidates::{CandidateMap, Operation};
use crate::closer::{mirror, Nesting};
use crate::config::SegmenterConfig;
use crate::lines::LineIndex;
use crate::rules::StatementKind;
use crate::types::{Command, Diagnostic};

/// How a candidate resolved inside its enclosing range
enum Resolution {
    Simple {
        end: usize,
    },
    Block {
        body_start: usize,
        body_end: usize,
        end: usize,
    },
}

/// One block being segmented: its body range and scan state
struct Scope {
    /// Next candidate index to visit
    next: usize,
    hi: usize,
    cursor: usize,
    /// Earliest pending marker (offset, kind)
    pending: Option<(usize, StatementKind)>,
    parent: Option<StatementKind>,
    depth: usize,
    /// The block command, emitted once its body is done
    enclosing: Option<Command>,
}

/// Turns sorted candidates into the flat command list
///
/// Nested bodies are handled with an explicit stack of scopes rather than
/// recursion, so nesting depth is bounded by `max_depth` only. Every command
/// goes into one flat list and a block's own command is pushed after the
/// commands of its body.
pub struct Descender<'a, 't> {
    source: &'a str,
    nesting: &'a Nesting,
    config: &'a SegmenterConfig,
    lines: LineIndex,
    ops: Vec<Operation<'t>>,
    commands: Vec<Command>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 't> Descender<'a, 't> {
    pub fn new(
        source: &'a str,
        nesting: &'a Nesting,
        config: &'a SegmenterConfig,
        candidates: CandidateMap<'t>,
    ) -> Self {
        Self {
            source,
            nesting,
            config,
            lines: LineIndex::new(source),
            ops: candidates.into_values().collect(),
            commands: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn run(mut self) -> (Vec<Command>, Vec<Diagnostic>) {
        let mut stack = vec![Scope {
            next: 0,
            hi: self.source.len(),
            cursor: 0,
            pending: None,
            parent: None,
            depth: 0,
            enclosing: None,
        }];

        while let Some(scope) = stack.last_mut() {
            let Some(op) = next_candidate(&self.ops, scope) else {
                if let Some(done) = stack.pop() {
                    self.close_scope(done);
                }
                continue;
            };

            if op.is_marker() {
                scope.pending.get_or_insert((op.opener_pos, op.rule.kind));
                continue;
            }

            let marker = scope.pending.take();
            let start = marker.map_or(op.opener_pos, |(pos, _)| pos);
            let kind = self.classify(op.rule.kind, scope.parent);
            let depth = scope.depth;

            match self.resolve(&op, scope.hi) {
                Some(Resolution::Simple { end }) => {
                    skip_to(&self.ops, scope, end);
                    let command = self.command(start, end, kind, false, depth);
                    self.commands.push(command);
                }
                Some(Resolution::Block {
                    body_start,
                    body_end,
                    end,
                }) => {
                    skip_to(&self.ops, scope, end);
                    let command = self.command(start, end, kind, true, depth);
                    if depth + 1 > self.config.max_depth {
                        log::warn!("{kind} at byte {start} exceeds nesting limit, kept whole");
                        self.diagnostics.push(Diagnostic::DepthLimit {
                            kind,
                            start,
                            depth,
                        });
                        self.commands.push(command);
                        continue;
                    }
                    let next = self.ops.partition_point(|o| o.opener_pos < body_start);
                    stack.push(Scope {
                        next,
                        hi: body_end,
                        cursor: body_start,
                        pending: None,
                        parent: Some(kind),
                        depth: depth + 1,
                        enclosing: Some(command),
                    });
                }
                None => {
                    scope.cursor = op.opener_end();
                    log::warn!("unterminated {kind} at byte {}", op.opener_pos);
                    self.diagnostics.push(Diagnostic::UnterminatedCommand {
                        kind,
                        start: op.opener_pos,
                    });
                    // the marker prefixed a statement that was dropped
                    if let Some((start, kind)) = marker {
                        self.diagnostics
                            .push(Diagnostic::DanglingMarker { kind, start });
                    }
                }
            }
        }

        (self.commands, self.diagnostics)
    }

    fn close_scope(&mut self, scope: Scope) {
        if let Some((start, kind)) = scope.pending {
            self.diagnostics
                .push(Diagnostic::DanglingMarker { kind, start });
        }
        if let Some(command) = scope.enclosing {
            self.commands.push(command);
        }
    }

    fn classify(&self, kind: StatementKind, parent: Option<StatementKind>) -> StatementKind {
        let in_type_body = parent.is_some_and(StatementKind::holds_methods);
        if self.config.classify_methods && kind == StatementKind::Function && in_type_body {
            StatementKind::Method
        } else {
            kind
        }
    }

    /// Resolve the closer of `op` within `[.., hi)`
    fn resolve(&self, op: &Operation<'t>, hi: usize) -> Option<Resolution> {
        let closer = op.rule.closer_str()?;

        if !op.rule.is_block() {
            let pos = self
                .nesting
                .find_at_depth(closer.as_bytes(), op.opener_end(), hi)?;
            return Some(Resolution::Simple {
                end: pos + closer.len(),
            });
        }

        let Some(sub_pos) = op.sub_block_opener_pos else {
            // body-less block: ends at the terminator found by the scanner
            let end = op.closer_end()?;
            return (end <= hi).then_some(Resolution::Simple { end });
        };
        let sub_block_opener = op.rule.sub_block_opener_str()?;
        let body_start = sub_pos + sub_block_opener.len();
        if body_start > hi {
            return None;
        }

        let Some(body_closer) = mirror(sub_block_opener) else {
            let body_end = self
                .nesting
                .find_unmasked(closer.as_bytes(), body_start, hi)?;
            return Some(Resolution::Block {
                body_start,
                body_end,
                end: body_end + closer.len(),
            });
        };

        let body_end = self
            .nesting
            .find_at_depth(body_closer.as_bytes(), body_start, hi)?;
        let after_body = body_end + body_closer.len();
        let end = if closer == body_closer {
            after_body
        } else {
            self.nesting
                .find_at_depth(closer.as_bytes(), after_body, hi)?
                + closer.len()
        };

        Some(Resolution::Block {
            body_start,
            body_end,
            end,
        })
    }

    fn command(
        &self,
        start: usize,
        end: usize,
        kind: StatementKind,
        has_sub_block: bool,
        depth: usize,
    ) -> Command {
        let (start_line, end_line) = self.lines.span_lines(start, end);
        Command {
            start,
            end,
            text: self.source[start..end].to_string(),
            kind,
            has_sub_block,
            depth,
            start_line,
            end_line,
        }
    }
}

/// Move the cursor of `scope` to `end`, skipping the candidates before it
fn skip_to(ops: &[Operation<'_>], scope: &mut Scope, end: usize) {
    scope.cursor = end;
    scope.next = scope
        .next
        .max(ops.partition_point(|op| op.opener_pos < end));
}

/// Next candidate of `scope` at or past its cursor, advancing `scope.next`
fn next_candidate<'t>(ops: &[Operation<'t>], scope: &mut Scope) -> Option<Operation<'t>> {
    while let Some(op) = ops.get(scope.next) {
        if op.opener_pos >= scope.hi {
            return None;
        }
        scope.next += 1;
        if op.opener_pos >= scope.cursor {
            return Some(*op);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::CandidateScanner;
    use crate::matcher::OpenerMatcher;
    use crate::regions::Masks;
    use crate::rules::RuleTable;
    use pretty_assertions::assert_eq;

    fn descend(source: &str, config: &SegmenterConfig) -> (Vec<Command>, Vec<Diagnostic>) {
        let table = RuleTable::c_like();
        let matcher = OpenerMatcher::new(&table);
        let masks = Masks::scan(source, &table);
        let nesting = Nesting::build(source, &masks, &table);
        let scanned = CandidateScanner::new(source, &table, &matcher, &masks, &nesting).scan();
        Descender::new(source, &nesting, config, scanned.candidates).run()
    }

    #[test]
    fn test_earliest_marker_starts_command() {
        let config = SegmenterConfig {
            classify_methods: false,
            ..Default::default()
        };
        let (commands, diagnostics) =
            descend("class A { static public function f() {} }", &config);

        assert!(diagnostics.is_empty());
        let outline: Vec<_> = commands
            .iter()
            .map(|c| (c.start, c.kind, c.depth))
            .collect();
        assert_eq!(
            outline,
            vec![
                (10, StatementKind::Function, 1),
                (0, StatementKind::Class, 0),
            ]
        );
    }

    #[test]
    fn test_bodiless_block_is_simple() {
        let (commands, _) = descend("abstract function f();", &SegmenterConfig::default());
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].span(), 0..22);
        assert!(!commands[0].has_sub_block);
    }

    #[test]
    fn test_statement_stops_at_block_end() {
        let (commands, diagnostics) =
            descend("if ($a) { $b = 1 } $c = 2;", &SegmenterConfig::default());

        assert_eq!(
            diagnostics,
            vec![Diagnostic::UnterminatedCommand {
                kind: StatementKind::Variable,
                start: 10
            }]
        );
        let kinds: Vec<_> = commands.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![StatementKind::If, StatementKind::Variable]);
    }

    #[test]
    fn test_marker_before_unterminated_statement_is_reported() {
        let (commands, diagnostics) = descend("public $a = 1", &SegmenterConfig::default());

        assert!(commands.is_empty());
        assert_eq!(
            diagnostics,
            vec![
                Diagnostic::UnterminatedCommand {
                    kind: StatementKind::Variable,
                    start: 7
                },
                Diagnostic::DanglingMarker {
                    kind: StatementKind::Scope,
                    start: 0
                },
            ]
        );
    }
}

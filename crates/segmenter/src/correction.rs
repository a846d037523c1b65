use crate::candidates::{CandidateSet, Operation};
use crate::closer::Nesting;
use crate::matcher::OpenerMatcher;
use crate::regions::Masks;
use crate::rules::{SyntaxRule, Token};

/// Re-roots candidates swallowed by a call-expression statement
///
/// Opener matching knows nothing about context, so inside `foo($CONST, 1);`
/// the variable and constant rules both fire. Every non-block candidate
/// whose opener lies after the call name and whose closer lies within the
/// call statement is dropped, and one call candidate rooted at the call name
/// takes its place.
///
/// A call statement is a call name (`foo`, `Foo::bar`, `new Foo`, ...) whose
/// own terminator at bracket depth zero directly follows a `)`. Neither the
/// name nor the argument list has to fit on one line: the opener may be
/// separated from its `(` by line breaks, and the terminator is found by
/// bracket depth, so `foo(\n    $A,\n);` is one call. Names inside comments,
/// strings and block headers are skipped.
///
/// Returns the number of call statements that absorbed spurious candidates.
pub fn correct_calls<'t>(
    source: &str,
    masks: &Masks,
    nesting: &Nesting,
    matcher: &OpenerMatcher,
    call_rule: &'t SyntaxRule,
    scanned: &mut CandidateSet<'t>,
) -> usize {
    let bytes = source.as_bytes();
    let closer = call_rule.closer_str().unwrap_or_default().as_bytes();
    let mut corrected = 0;
    let mut cursor = 0;

    while let Some(name) = matcher.find(&Token::LowercaseIdent, bytes, cursor) {
        let start = name.pos;
        let rooted_in_code = masks.region_at(start).is_none()
            && !scanned.in_header(start)
            && !scanned.candidates.get(&start).is_some_and(Operation::has_body);
        let terminator = if rooted_in_code {
            nesting
                .find_at_depth(closer, name.end(), bytes.len())
                .filter(|&pos| ends_argument_list(bytes, name.end(), pos))
        } else {
            None
        };
        let Some(terminator) = terminator else {
            cursor = name.end();
            continue;
        };
        let end = terminator + closer.len();

        let candidates = &mut scanned.candidates;
        let spurious: Vec<usize> = candidates
            .range(start + 1..end)
            .filter(|(_, op)| !op.is_marker() && !op.has_body())
            .filter(|(_, op)| closes_within(nesting, op, end))
            .map(|(&pos, _)| pos)
            .collect();

        if !spurious.is_empty() {
            for pos in &spurious {
                candidates.remove(pos);
            }
            candidates.insert(
                start,
                Operation {
                    rule: call_rule,
                    opener_pos: start,
                    opener_len: name.len,
                    closer_pos: Some(terminator),
                    closer_len: closer.len(),
                    sub_block_opener_pos: None,
                },
            );
            log::trace!(
                "call at {start}..{end} absorbed {} candidate(s)",
                spurious.len()
            );
            corrected += 1;
        }

        cursor = end;
    }

    corrected
}

/// Whether the code between a call name and its terminator opens with `(`
/// and closes with `)`, ignoring whitespace
fn ends_argument_list(source: &[u8], name_end: usize, terminator: usize) -> bool {
    let between = &source[name_end..terminator];
    let first = between.iter().position(|b| !b.is_ascii_whitespace());
    let last = between.iter().rposition(|b| !b.is_ascii_whitespace());

    match (first, last) {
        (Some(first), Some(last)) => between[first] == b'(' && between[last] == b')',
        _ => false,
    }
}

/// Whether the candidate's own closer comes before `end`
fn closes_within(nesting: &Nesting, op: &Operation<'_>, end: usize) -> bool {
    match op.closer_end() {
        Some(closer_end) => closer_end <= end,
        None => {
            let closer = op.rule.closer_str().unwrap_or_default().as_bytes();
            nesting
                .find_unmasked(closer, op.opener_end(), end)
                .is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::CandidateScanner;
    use crate::rules::{RuleTable, StatementKind};
    use pretty_assertions::assert_eq;

    fn corrected(source: &str) -> (usize, Vec<(usize, StatementKind)>) {
        let table = RuleTable::c_like();
        let matcher = OpenerMatcher::new(&table);
        let masks = Masks::scan(source, &table);
        let nesting = Nesting::build(source, &masks, &table);
        let mut scanned =
            CandidateScanner::new(source, &table, &matcher, &masks, &nesting).scan();
        let call_rule = table.call_rule().unwrap();
        let count = correct_calls(source, &masks, &nesting, &matcher, call_rule, &mut scanned);
        let kinds = scanned
            .candidates
            .iter()
            .map(|(&pos, op)| (pos, op.rule.kind))
            .collect();
        (count, kinds)
    }

    #[test]
    fn test_constant_argument_is_absorbed() {
        let (count, kinds) = corrected("doSomething($CONST, 1);");
        assert_eq!(count, 1);
        assert_eq!(kinds, vec![(0, StatementKind::Call)]);
    }

    #[test]
    fn test_statement_before_call_is_kept() {
        let (_, kinds) = corrected("return foo($x);");
        assert_eq!(
            kinds,
            vec![(0, StatementKind::Return), (7, StatementKind::Call)]
        );
    }

    #[test]
    fn test_keyword_is_not_a_call() {
        let (count, kinds) = corrected("if ($a) { $b = 1; }");
        assert_eq!(count, 0);
        assert_eq!(
            kinds,
            vec![(0, StatementKind::If), (10, StatementKind::Variable)]
        );
    }

    #[test]
    fn test_call_in_comment_is_ignored() {
        let (count, _) = corrected("// foo($A);\n$b = 1;");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_closure_argument_block_survives() {
        let source = "array_map(function ($x) { return $x; }, $list);";
        let (_, kinds) = corrected(source);
        assert_eq!(
            kinds,
            vec![(0, StatementKind::Call), (10, StatementKind::Function)]
        );
    }

    #[test]
    fn test_function_name_in_header_is_not_a_call() {
        let source = "function f1($a) { $b = $a; } foo($a);";
        let (count, kinds) = corrected(source);
        assert_eq!(count, 1);
        assert_eq!(
            kinds,
            vec![
                (0, StatementKind::Function),
                (18, StatementKind::Variable),
                (23, StatementKind::Variable),
                (29, StatementKind::Call),
            ]
        );
    }

    #[test]
    fn test_match_across_block_end_is_rejected() {
        let (count, kinds) = corrected("if ($a) { bar($b) } baz();");
        assert_eq!(count, 0);
        assert_eq!(
            kinds,
            vec![
                (0, StatementKind::If),
                (10, StatementKind::Call),
                (14, StatementKind::Variable),
                (20, StatementKind::Call),
            ]
        );
    }

    #[test]
    fn test_class_name_call_is_rooted_at_the_class() {
        let (count, kinds) = corrected("Route::get('/', $handler);");
        assert_eq!(count, 1);
        assert_eq!(kinds, vec![(0, StatementKind::Call)]);
    }

    #[test]
    fn test_multi_line_call_is_one_statement() {
        let (count, kinds) = corrected("register(\n    $A,\n    MAX\n);\n$b = 1;");
        assert_eq!(count, 1);
        assert_eq!(
            kinds,
            vec![(0, StatementKind::Call), (29, StatementKind::Variable)]
        );
    }

    #[test]
    fn test_trailing_operator_is_not_a_call_statement() {
        let (count, kinds) = corrected("foo($a) . $b;");
        assert_eq!(count, 0);
        assert_eq!(
            kinds,
            vec![
                (0, StatementKind::Call),
                (4, StatementKind::Variable),
                (10, StatementKind::Variable),
            ]
        );
    }
}

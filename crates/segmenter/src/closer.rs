//! Closer resolution: finding terminators that are real code, not text inside
//! a comment or string literal.

use crate::matcher::find_bytes;
use crate::regions::Masks;
use crate::rules::RuleTable;
use std::collections::{BTreeSet, HashMap};

/// Where a block rule's header ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderEnd {
    /// Offset of the sub-block opener
    Body(usize),
    /// Offset of the statement terminator; the block has no body
    Terminator(usize),
}

impl HeaderEnd {
    #[must_use]
    pub const fn pos(self) -> usize {
        match self {
            Self::Body(pos) | Self::Terminator(pos) => pos,
        }
    }
}

/// Closing bracket matching a bracket-like sub-block opener
#[must_use]
pub fn mirror(opener: &str) -> Option<&'static str> {
    match opener {
        "{" => Some("}"),
        "(" => Some(")"),
        "[" => Some("]"),
        _ => None,
    }
}

/// Move a naive closer position out of comments and string literals
///
/// While `naive` falls inside a comment region or a string-literal region,
/// search again for `closer` from that region's end. Comment and string
/// masks are checked independently until neither applies, so an already
/// clean position is returned unchanged.
pub fn resolve_closer(
    source: &[u8],
    masks: &Masks,
    closer: &[u8],
    naive: usize,
    hi: usize,
) -> Option<usize> {
    let mut pos = naive;

    loop {
        if pos + closer.len() > hi {
            return None;
        }
        if let Some(comment) = masks.comment_at(pos) {
            pos = find_bytes(source, closer, comment.end)?;
            continue;
        }
        if let Some(string) = masks.string_at(pos) {
            pos = find_bytes(source, closer, string.end)?;
            continue;
        }
        return Some(pos);
    }
}

/// First unmasked `closer` in `[from, hi)`
pub fn find_unmasked(
    source: &[u8],
    masks: &Masks,
    closer: &[u8],
    from: usize,
    hi: usize,
) -> Option<usize> {
    let naive = find_bytes(source, closer, from)?;
    resolve_closer(source, masks, closer, naive, hi)
}

/// Bracket nesting of one buffer, plus every unmasked occurrence of the
/// tokens a rule table searches for
///
/// Each byte outside comments and strings belongs to a bracket group. An
/// opening bracket belongs to the group around it. A closing bracket belongs
/// to the group it closes. An unmatched closing bracket ends the top-level
/// group it sits in, and a fresh one starts after it. A search "at depth
/// zero" from an offset is then a lookup among the occurrences recorded for
/// that offset's group.
///
/// Built once per buffer, so repeated closer searches cost a binary search
/// each instead of a rescan of the remaining input.
#[derive(Debug, Default)]
pub struct Nesting {
    len: usize,
    /// `(offset, group)`: `group` applies from `offset` on
    boundaries: Vec<(usize, usize)>,
    tokens: HashMap<Vec<u8>, Occurrences>,
}

#[derive(Debug, Default)]
struct Occurrences {
    all: Vec<usize>,
    by_group: HashMap<usize, Vec<usize>>,
}

impl Nesting {
    pub fn build(source: &str, masks: &Masks, table: &RuleTable) -> Self {
        let bytes = source.as_bytes();
        let mut nesting = Self {
            len: bytes.len(),
            boundaries: bracket_groups(bytes, masks),
            tokens: HashMap::new(),
        };

        for token in structural_tokens(table) {
            let occurrences = nesting.occurrences(bytes, masks, token.as_bytes());
            nesting.tokens.insert(token.into_bytes(), occurrences);
        }
        log::debug!(
            "nesting: {} bracket boundaries, {} indexed tokens",
            nesting.boundaries.len(),
            nesting.tokens.len()
        );

        nesting
    }

    fn occurrences(&self, source: &[u8], masks: &Masks, token: &[u8]) -> Occurrences {
        let mut occurrences = Occurrences::default();
        let mut from = 0;

        while let Some(pos) = find_unmasked(source, masks, token, from, source.len()) {
            occurrences.all.push(pos);
            occurrences
                .by_group
                .entry(self.group_at(pos))
                .or_default()
                .push(pos);
            from = pos + 1;
        }

        occurrences
    }

    fn group_at(&self, pos: usize) -> usize {
        let index = self.boundaries.partition_point(|&(start, _)| start <= pos);
        index.checked_sub(1).map_or(0, |i| self.boundaries[i].1)
    }

    /// First unmasked `token` in `[from, hi)`
    ///
    /// Tokens the rule table never searches for are not indexed and never
    /// found.
    #[must_use]
    pub fn find_unmasked(&self, token: &[u8], from: usize, hi: usize) -> Option<usize> {
        let all = &self.tokens.get(token)?.all;
        self.first_from(all, token, from, hi)
    }

    /// First unmasked `token` in `[from, hi)` that is not nested in brackets
    /// opened after `from`
    ///
    /// Gives up at an unmatched closing bracket: a statement cannot run past
    /// the end of the block that contains it.
    #[must_use]
    pub fn find_at_depth(&self, token: &[u8], from: usize, hi: usize) -> Option<usize> {
        let group = self
            .tokens
            .get(token)?
            .by_group
            .get(&self.group_at(from))?;
        self.first_from(group, token, from, hi)
    }

    fn first_from(&self, sorted: &[usize], token: &[u8], from: usize, hi: usize) -> Option<usize> {
        let pos = *sorted.get(sorted.partition_point(|&pos| pos < from))?;
        (pos + token.len() <= hi.min(self.len)).then_some(pos)
    }

    /// Find where a block header ends: at its sub-block opener, or at the
    /// terminator when the statement has no body
    ///
    /// Only tokens outside parentheses count, so `for (;;)` and closures in
    /// an argument list do not end the header early. Returns `None` when an
    /// unmatched closing bracket or end of input comes first.
    #[must_use]
    pub fn find_header_end(
        &self,
        from: usize,
        sub_block_opener: &[u8],
        terminator: &[u8],
    ) -> Option<HeaderEnd> {
        let body = self.find_at_depth(sub_block_opener, from, self.len);
        let end = self.find_at_depth(terminator, from, self.len);

        match (body, end) {
            (Some(body), Some(end)) if end < body => Some(HeaderEnd::Terminator(end)),
            (Some(body), _) => Some(HeaderEnd::Body(body)),
            (None, end) => end.map(HeaderEnd::Terminator),
        }
    }
}

/// Closers, sub-block openers, their mirrors and the terminator
fn structural_tokens(table: &RuleTable) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    tokens.insert(table.terminator.clone());

    for rule in table.candidate_rules() {
        tokens.extend(rule.closer_str().map(str::to_string));
        if let Some(opener) = rule.sub_block_opener_str() {
            tokens.insert(opener.to_string());
            tokens.extend(mirror(opener).map(str::to_string));
        }
    }

    tokens.retain(|token| !token.is_empty());
    tokens
}

/// Group boundaries over the unmasked bytes of `source`
fn bracket_groups(source: &[u8], masks: &Masks) -> Vec<(usize, usize)> {
    let mut regions: Vec<(usize, usize)> = masks
        .comments()
        .iter()
        .chain(masks.strings())
        .map(|region| (region.start, region.end))
        .collect();
    regions.sort_unstable();
    let mut regions = regions.into_iter().peekable();

    let mut boundaries = Vec::new();
    let mut outer = Vec::new();
    let mut current = 0;
    let mut fresh = 1;
    let mut pos = 0;

    while pos < source.len() {
        if let Some(&(start, end)) = regions.peek() {
            if pos >= start {
                pos = pos.max(end);
                regions.next();
                continue;
            }
        }

        match source[pos] {
            b'(' | b'[' | b'{' => {
                outer.push(current);
                current = fresh;
                fresh += 1;
                boundaries.push((pos + 1, current));
            }
            b')' | b']' | b'}' => {
                current = match outer.pop() {
                    Some(group) => group,
                    None => {
                        fresh += 1;
                        fresh - 1
                    }
                };
                boundaries.push((pos + 1, current));
            }
            _ => {}
        }
        pos += 1;
    }

    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleTable;

    fn masks(source: &str) -> Masks {
        Masks::scan(source, &RuleTable::c_like())
    }

    #[test]
    fn test_resolve_closer_skips_comment_and_string() {
        let source = "$a = 1 /* ; */ + ';' ;";
        let m = masks(source);
        let bytes = source.as_bytes();

        let naive = find_bytes(bytes, b";", 0).unwrap();
        assert_eq!(naive, 10);
        assert_eq!(resolve_closer(bytes, &m, b";", naive, bytes.len()), Some(21));
        assert_eq!(resolve_closer(bytes, &m, b";", 21, bytes.len()), Some(21));
        assert_eq!(find_unmasked(bytes, &m, b";", 0, bytes.len()), Some(21));
        assert_eq!(find_unmasked(bytes, &m, b";", 0, 20), None);
    }

    fn nesting(source: &str) -> Nesting {
        Nesting::build(source, &masks(source), &RuleTable::c_like())
    }

    #[test]
    fn test_find_at_depth_ignores_nested_terminators() {
        let source = "$f = function() { return 1; }; $g = 2;";
        let nesting = nesting(source);
        assert_eq!(nesting.find_at_depth(b";", 1, source.len()), Some(29));
        assert_eq!(nesting.find_at_depth(b";", 18, source.len()), Some(26));
        assert_eq!(nesting.find_at_depth(b";", 1, 29), None);
    }

    #[test]
    fn test_find_at_depth_matches_block_close() {
        let source = "{ if (a) { b; } '}' }";
        let nesting = nesting(source);
        assert_eq!(nesting.find_at_depth(b"}", 1, source.len()), Some(20));
        assert_eq!(nesting.find_at_depth(b"}", 10, source.len()), Some(14));
    }

    #[test]
    fn test_find_at_depth_stops_at_enclosing_close() {
        let source = "$a = 1 } $b = 2;";
        let nesting = nesting(source);
        assert_eq!(nesting.find_at_depth(b";", 1, source.len()), None);
        assert_eq!(nesting.find_at_depth(b";", 9, source.len()), Some(15));
    }

    #[test]
    fn test_unclosed_bracket_hides_later_terminators() {
        let source = "$a = f(1; $b = 2;";
        let nesting = nesting(source);
        assert_eq!(nesting.find_at_depth(b";", 1, source.len()), None);
        assert_eq!(nesting.find_at_depth(b";", 7, source.len()), Some(8));
        assert_eq!(nesting.find_unmasked(b";", 1, source.len()), Some(8));
    }

    #[test]
    fn test_unindexed_token_is_never_found() {
        let source = "begin end;";
        assert_eq!(nesting(source).find_unmasked(b"end", 0, source.len()), None);
    }

    #[test]
    fn test_header_end() {
        let source = "for ($i = 0; $i < 3; $i++) { }";
        assert_eq!(
            nesting(source).find_header_end(3, b"{", b";"),
            Some(HeaderEnd::Body(27))
        );

        let source = "abstract function f($a = '{');";
        assert_eq!(
            nesting(source).find_header_end(17, b"{", b";"),
            Some(HeaderEnd::Terminator(29))
        );

        let source = "foo(Bar::class)";
        assert_eq!(nesting(source).find_header_end(14, b"{", b";"), None);

        let source = "if (";
        assert_eq!(nesting(source).find_header_end(2, b"{", b";"), None);
    }

    #[test]
    fn test_mirror() {
        assert_eq!(mirror("{"), Some("}"));
        assert_eq!(mirror("begin"), None);
    }
}

use crate::closer::{HeaderEnd, Nesting};
use crate::matcher::{Match, OpenerMatcher};
use crate::regions::Masks;
use crate::rules::{RuleTable, SyntaxRule};
use std::collections::BTreeMap;

/// Tentative match of a rule's opener
#[derive(Debug, Clone, Copy)]
pub struct Operation<'t> {
    pub rule: &'t SyntaxRule,
    pub opener_pos: usize,
    pub opener_len: usize,
    /// Terminator of a body-less block, or of a re-rooted call; simple
    /// statements resolve theirs during descent
    pub closer_pos: Option<usize>,
    pub closer_len: usize,
    /// Sub-block opener for blocks that have a body
    pub sub_block_opener_pos: Option<usize>,
}

impl Operation<'_> {
    #[must_use]
    pub fn is_marker(&self) -> bool {
        self.rule.is_marker()
    }

    /// Block candidate with a located body
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.rule.is_block() && self.sub_block_opener_pos.is_some()
    }

    #[must_use]
    pub const fn opener_end(&self) -> usize {
        self.opener_pos + self.opener_len
    }

    #[must_use]
    pub fn closer_end(&self) -> Option<usize> {
        self.closer_pos.map(|pos| pos + self.closer_len)
    }
}

/// Candidates keyed by opener offset; a later rule overwrites an earlier one
/// at the same offset
pub type CandidateMap<'t> = BTreeMap<usize, Operation<'t>>;

/// Output of the candidate scan
#[derive(Debug, Clone, Default)]
pub struct CandidateSet<'t> {
    pub candidates: CandidateMap<'t>,
    /// Union of block header spans, disjoint and sorted
    pub header_spans: Vec<(usize, usize)>,
}

impl CandidateSet<'_> {
    /// Whether `pos` lies strictly inside a block header
    #[must_use]
    pub fn in_header(&self, pos: usize) -> bool {
        enclosing_span(&self.header_spans, pos).is_some()
    }
}

/// Span from a block opener to its sub-block opener (or terminator)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub opener_pos: usize,
    pub end: HeaderEnd,
}

/// Finds every rule opener outside comments, strings and block headers
pub struct CandidateScanner<'a, 't> {
    source: &'a [u8],
    table: &'t RuleTable,
    matcher: &'a OpenerMatcher,
    masks: &'a Masks,
    nesting: &'a Nesting,
}

impl<'a, 't> CandidateScanner<'a, 't> {
    pub fn new(
        source: &'a str,
        table: &'t RuleTable,
        matcher: &'a OpenerMatcher,
        masks: &'a Masks,
        nesting: &'a Nesting,
    ) -> Self {
        Self {
            source: source.as_bytes(),
            table,
            matcher,
            masks,
            nesting,
        }
    }

    /// Scan headers first, then all candidates masked by them
    pub fn scan(&self) -> CandidateSet<'t> {
        let headers = self.headers();
        let header_spans = merge_header_spans(&headers);
        let candidates = self.candidates(&header_spans);
        log::debug!(
            "candidate scan: {} headers, {} candidates",
            headers.len(),
            candidates.len()
        );
        CandidateSet {
            candidates,
            header_spans,
        }
    }

    /// Block openers with the position their header ends at
    ///
    /// Parameter lists and conditions live between a block opener and its
    /// sub-block opener; anything found there is an argument, not a statement.
    pub fn headers(&self) -> BTreeMap<usize, Header> {
        let mut headers = BTreeMap::new();

        for rule in self.table.candidate_rules().filter(|rule| rule.is_block()) {
            let mut cursor = 0;
            while let Some(found) = self.matcher.find(&rule.opener, self.source, cursor) {
                if let Some(region) = self.masks.region_at(found.pos) {
                    cursor = region.end;
                    continue;
                }
                match self.header_end(rule, found) {
                    Some(end) => {
                        headers.insert(
                            found.pos,
                            Header {
                                opener_pos: found.pos,
                                end,
                            },
                        );
                        cursor = end.pos().max(found.end());
                    }
                    None => cursor = found.end(),
                }
            }
        }

        headers
    }

    fn header_end(&self, rule: &SyntaxRule, found: Match) -> Option<HeaderEnd> {
        let sub_block_opener = rule.sub_block_opener_str()?;
        self.nesting.find_header_end(
            found.end(),
            sub_block_opener.as_bytes(),
            self.table.terminator.as_bytes(),
        )
    }

    fn candidates(&self, header_spans: &[(usize, usize)]) -> CandidateMap<'t> {
        let mut candidates = CandidateMap::new();

        for rule in self.table.candidate_rules() {
            let mut cursor = 0;
            while let Some(found) = self.matcher.find(&rule.opener, self.source, cursor) {
                if let Some(region) = self.masks.region_at(found.pos) {
                    cursor = region.end;
                    continue;
                }
                if let Some(&(_, end)) = enclosing_span(header_spans, found.pos) {
                    cursor = end;
                    continue;
                }

                cursor = found.end();
                if let Some(operation) = self.operation(rule, found) {
                    candidates.insert(found.pos, operation);
                }
            }
        }

        candidates
    }

    fn operation(&self, rule: &'t SyntaxRule, found: Match) -> Option<Operation<'t>> {
        let mut operation = Operation {
            rule,
            opener_pos: found.pos,
            opener_len: found.len,
            closer_pos: None,
            closer_len: 0,
            sub_block_opener_pos: None,
        };

        if rule.is_block() {
            match self.header_end(rule, found)? {
                HeaderEnd::Body(pos) => operation.sub_block_opener_pos = Some(pos),
                HeaderEnd::Terminator(pos) => {
                    operation.closer_pos = Some(pos);
                    operation.closer_len = self.table.terminator.len();
                }
            }
        } else if let Some(closer) = rule.closer_str() {
            operation.closer_len = closer.len();
        }

        Some(operation)
    }
}

/// Union of header spans as disjoint `(start, end)` pairs sorted by start
fn merge_header_spans(headers: &BTreeMap<usize, Header>) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::with_capacity(headers.len());

    for header in headers.values() {
        let (start, end) = (header.opener_pos, header.end.pos());
        match spans.last_mut() {
            Some(last) if start < last.1 => last.1 = last.1.max(end),
            _ => spans.push((start, end)),
        }
    }

    spans
}

/// Span strictly containing `pos` (its own opener is not inside)
fn enclosing_span(spans: &[(usize, usize)], pos: usize) -> Option<&(usize, usize)> {
    let index = spans.partition_point(|&(start, _)| start < pos);
    index
        .checked_sub(1)
        .map(|i| &spans[i])
        .filter(|&&(_, end)| pos < end)
}

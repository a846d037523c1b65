use crate::matcher::find_bytes;
use crate::rules::{RuleTable, StatementKind, SyntaxRule};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of masked span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Comment,
    StringLiteral,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comment => f.write_str("comment"),
            Self::StringLiteral => f.write_str("string literal"),
        }
    }
}

/// A comment or string literal span `[start, end)` inside which no opener or
/// closer counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub kind: RegionKind,
    /// False when the closer was missing and the region runs to end of input
    pub terminated: bool,
}

impl Region {
    #[must_use]
    pub const fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }
}

/// Comment and string-literal regions of one buffer, each sorted by start
#[derive(Debug, Clone, Default)]
pub struct Masks {
    comments: Vec<Region>,
    strings: Vec<Region>,
}

impl Masks {
    /// Locate every comment and string literal in `source`
    ///
    /// One left-to-right pass takes the earliest region opener at each step,
    /// so a string opener inside a comment is skipped and so is a comment
    /// opener inside a string.
    pub fn scan(source: &str, table: &RuleTable) -> Self {
        let bytes = source.as_bytes();
        let rules: Vec<&SyntaxRule> = table.region_rules().collect();
        let openers: Vec<&[u8]> = rules
            .iter()
            .map(|rule| rule.opener.as_literal().unwrap_or_default().as_bytes())
            .collect();
        // None once a rule has no further opener in the buffer
        let mut next: Vec<Option<usize>> =
            openers.iter().map(|opener| find_bytes(bytes, opener, 0)).collect();
        let mut masks = Self::default();
        let mut cursor = 0;

        while cursor < bytes.len() {
            let mut earliest: Option<(usize, usize)> = None;
            for (index, opener) in openers.iter().enumerate() {
                if next[index].is_some_and(|pos| pos < cursor) {
                    next[index] = find_bytes(bytes, opener, cursor);
                }
                if let Some(pos) = next[index] {
                    if earliest.map_or(true, |(best, _)| pos < best) {
                        earliest = Some((pos, index));
                    }
                }
            }

            let Some((start, index)) = earliest else {
                break;
            };
            let region = close_region(bytes, rules[index], start);
            cursor = region.end;
            match region.kind {
                RegionKind::Comment => masks.comments.push(region),
                RegionKind::StringLiteral => masks.strings.push(region),
            }
        }

        log::debug!(
            "region scan: {} comments, {} string literals",
            masks.comments.len(),
            masks.strings.len()
        );
        masks
    }

    #[must_use]
    pub fn comments(&self) -> &[Region] {
        &self.comments
    }

    #[must_use]
    pub fn strings(&self) -> &[Region] {
        &self.strings
    }

    /// Regions whose closer was never found
    pub fn unterminated(&self) -> impl Iterator<Item = &Region> {
        self.comments
            .iter()
            .chain(&self.strings)
            .filter(|region| !region.terminated)
    }

    #[must_use]
    pub fn comment_at(&self, pos: usize) -> Option<&Region> {
        region_at(&self.comments, pos)
    }

    #[must_use]
    pub fn string_at(&self, pos: usize) -> Option<&Region> {
        region_at(&self.strings, pos)
    }

    /// Any region covering `pos`
    #[must_use]
    pub fn region_at(&self, pos: usize) -> Option<&Region> {
        self.comment_at(pos).or_else(|| self.string_at(pos))
    }

    /// First offset at or after `pos` that is not masked
    #[must_use]
    pub fn skip(&self, pos: usize) -> usize {
        self.region_at(pos).map_or(pos, |region| region.end)
    }
}

fn region_at(regions: &[Region], pos: usize) -> Option<&Region> {
    let index = regions.partition_point(|region| region.start <= pos);
    index
        .checked_sub(1)
        .map(|i| &regions[i])
        .filter(|region| region.contains(pos))
}

fn close_region(bytes: &[u8], rule: &SyntaxRule, start: usize) -> Region {
    let kind = match rule.kind {
        StatementKind::StringLiteral => RegionKind::StringLiteral,
        _ => RegionKind::Comment,
    };
    let opener_len = rule.opener.as_literal().map_or(0, str::len);
    let closer = rule.closer_str().unwrap_or_default();

    match find_closer(bytes, closer.as_bytes(), start + opener_len, rule.escape) {
        Some(pos) => Region {
            start,
            end: pos + closer.len(),
            kind,
            terminated: true,
        },
        None => Region {
            start,
            end: bytes.len(),
            kind,
            // a line comment on the last line closes at end of input
            terminated: closer.bytes().all(|b| b == b'\n' || b == b'\r'),
        },
    }
}

/// Next `closer` at or after `from` that is not escaped
///
/// A closer preceded by an odd run of escape characters is part of the
/// literal; the search resumes right after it.
fn find_closer(bytes: &[u8], closer: &[u8], from: usize, escape: Option<char>) -> Option<usize> {
    let escape = escape.and_then(|c| u8::try_from(c).ok());
    let mut cursor = from;

    loop {
        let pos = find_bytes(bytes, closer, cursor)?;
        let Some(escape) = escape else {
            return Some(pos);
        };
        let run = bytes[from..pos]
            .iter()
            .rev()
            .take_while(|&&b| b == escape)
            .count();
        if run % 2 == 0 {
            return Some(pos);
        }
        cursor = pos + 1;
    }
}

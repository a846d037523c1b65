//! Opener matching for literal tokens and the identifier predicates.
//!
//! Everything here works on raw bytes: tokens are ASCII in practice and byte
//! offsets never need to land on a char boundary until a command is sliced.

use crate::rules::{RuleTable, Token};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::HashSet;

const NAME: &str = r"[A-Za-z_][A-Za-z0-9_]*";

/// Call name followed by `(`; group 1 is the name with any class prefix
///
/// Names look like `foo`, `App\foo`, `Foo::bar`, `\App\Foo::bar`,
/// `parent::set` or `new Foo`. Member chains such as `this->run` match too;
/// [`OpenerMatcher::is_call_site`] rejects them after a `$`.
static CALL_OPENER: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(
        r"(?-u)(\bnew[ \t]+\\?{NAME}(?:\\{NAME})*|\\?\b(?:{NAME}\\)*(?:{NAME}::)?[a-z_][A-Za-z0-9_]*(?:(?:::|->){NAME})*)[ \t\r\n]*\("
    );
    Regex::new(&pattern).expect("valid call regex")
});

static UPPERCASE_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)\b[A-Z][A-Z0-9_]*\b").expect("valid constant regex"));

/// A located opener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub pos: usize,
    pub len: usize,
}

impl Match {
    #[must_use]
    pub const fn end(self) -> usize {
        self.pos + self.len
    }
}

pub(crate) const fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// Naive forward search for `needle` in `hay[from..]`
pub(crate) fn find_bytes(hay: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= hay.len() {
        return None;
    }
    hay[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

/// Member access or variable sigil directly before `pos`
fn follows_accessor(source: &[u8], pos: usize) -> bool {
    let before = &source[..pos];
    matches!(before.last(), Some(b'$' | b'\\'))
        || before.ends_with(b"->")
        || before.ends_with(b"::")
}

/// Finds rule openers, honoring identifier boundaries and keyword exclusions
#[derive(Debug, Clone)]
pub struct OpenerMatcher {
    keywords: HashSet<String>,
}

impl OpenerMatcher {
    pub fn new(table: &RuleTable) -> Self {
        Self {
            keywords: table.keywords(),
        }
    }

    #[must_use]
    pub fn is_keyword(&self, ident: &[u8]) -> bool {
        std::str::from_utf8(ident).is_ok_and(|text| self.keywords.contains(text))
    }

    /// Next occurrence of `token` at or after `from`
    pub fn find(&self, token: &Token, source: &[u8], from: usize) -> Option<Match> {
        match token {
            Token::Literal(text) => Self::find_literal(source, text.as_bytes(), from),
            Token::LowercaseIdent => self.find_call(source, from),
            Token::UppercaseIdent => Self::find_uppercase(source, from),
        }
    }

    fn find_literal(source: &[u8], needle: &[u8], from: usize) -> Option<Match> {
        let word_start = needle.first().copied().is_some_and(is_ident_byte);
        let word_end = needle.last().copied().is_some_and(is_ident_byte);
        let mut cursor = from;

        while let Some(pos) = find_bytes(source, needle, cursor) {
            let end = pos + needle.len();
            let clean_start = !word_start
                || (pos == 0 || !is_ident_byte(source[pos - 1])) && !follows_accessor(source, pos);
            let clean_end = !word_end
                || (source.get(end).map_or(true, |&b| !is_ident_byte(b))
                    && !source[end..].starts_with(b"::"));

            if clean_start && clean_end {
                return Some(Match {
                    pos,
                    len: needle.len(),
                });
            }
            cursor = pos + 1;
        }

        None
    }

    fn find_call(&self, source: &[u8], from: usize) -> Option<Match> {
        let mut cursor = from;

        while cursor < source.len() {
            let caps = CALL_OPENER.captures_at(source, cursor)?;
            let name = caps.get(1)?;
            if self.is_call_site(source, name.start(), name.as_bytes()) {
                return Some(Match {
                    pos: name.start(),
                    len: name.len(),
                });
            }
            // nothing inside a rejected name can start a call
            cursor = name.end();
        }

        None
    }

    /// Whether `name` at `pos` can start a call statement
    ///
    /// A bare keyword (`if (`) is not a call, and neither is a member or
    /// variable reference (`$fn(`, `->run(`). Qualified names such as
    /// `Foo::bar` or `new Foo` are never keywords.
    pub(crate) fn is_call_site(&self, source: &[u8], pos: usize, name: &[u8]) -> bool {
        let qualified = !name.iter().all(|&b| is_ident_byte(b));
        let before_is_ident = pos > 0 && is_ident_byte(source[pos - 1]);

        !before_is_ident && !follows_accessor(source, pos) && (qualified || !self.is_keyword(name))
    }

    fn find_uppercase(source: &[u8], from: usize) -> Option<Match> {
        let mut cursor = from;

        while cursor < source.len() {
            let found = UPPERCASE_IDENT.find_at(source, cursor)?;
            let before_is_ident = found.start() > 0 && is_ident_byte(source[found.start() - 1]);
            let after_is_ident = source.get(found.end()).is_some_and(|&b| is_ident_byte(b));
            let class_name = source[found.end()..].starts_with(b"::");
            if !before_is_ident && !after_is_ident && !class_name {
                return Some(Match {
                    pos: found.start(),
                    len: found.len(),
                });
            }
            cursor = found.start() + 1;
        }

        None
    }
}

use crate::error::{Result, SegmentError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// How a rule recognizes its opener (or closer) in the buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    /// Literal text; word-like literals only match on identifier boundaries
    Literal(String),
    /// Lowercase-leading identifier used as a call name (`foo(`, `parent::set(`)
    LowercaseIdent,
    /// Fully-uppercase identifier (`MAX_SIZE`)
    UppercaseIdent,
}

impl Token {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Literal text, if this is not a predicate token
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            Self::LowercaseIdent | Self::UppercaseIdent => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{text:?}"),
            Self::LowercaseIdent => f.write_str("<lowercase identifier>"),
            Self::UppercaseIdent => f.write_str("<uppercase identifier>"),
        }
    }
}

/// Kind of statement a rule recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Comment,
    StringLiteral,
    Variable,
    Return,
    /// Visibility marker (`public`, `protected`, `private`)
    Scope,
    /// Abstractness marker (`abstract`, `final`)
    Abstract,
    Static,
    Function,
    /// Function declared inside a class, trait or interface body
    Method,
    Trait,
    Interface,
    Class,
    Constant,
    Namespace,
    Use,
    If,
    Else,
    DoWhile,
    While,
    For,
    Foreach,
    Switch,
    Try,
    Catch,
    Finally,
    Throw,
    Echo,
    /// Call-expression statement (`name(...);`)
    Call,
}

impl StatementKind {
    /// Kinds the region scanner owns; they never become candidates
    #[must_use]
    pub const fn is_region(self) -> bool {
        matches!(self, Self::Comment | Self::StringLiteral)
    }

    /// Bodies of these kinds hold methods rather than functions
    #[must_use]
    pub const fn holds_methods(self) -> bool {
        matches!(self, Self::Class | Self::Trait | Self::Interface)
    }

    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::StringLiteral => "string_literal",
            Self::Variable => "variable",
            Self::Return => "return",
            Self::Scope => "scope",
            Self::Abstract => "abstract",
            Self::Static => "static",
            Self::Function => "function",
            Self::Method => "method",
            Self::Trait => "trait",
            Self::Interface => "interface",
            Self::Class => "class",
            Self::Constant => "constant",
            Self::Namespace => "namespace",
            Self::Use => "use",
            Self::If => "if",
            Self::Else => "else",
            Self::DoWhile => "do_while",
            Self::While => "while",
            Self::For => "for",
            Self::Foreach => "foreach",
            Self::Switch => "switch",
            Self::Try => "try",
            Self::Catch => "catch",
            Self::Finally => "finally",
            Self::Throw => "throw",
            Self::Echo => "echo",
            Self::Call => "call",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to recognize one statement, declaration or lexical region
///
/// The shape of a rule decides its role:
/// - comment/string-literal kinds are *regions* and only feed the masks
/// - no closer: a *marker* that prefixes the next real command
/// - closer without sub-block: a *simple* statement
/// - closer with sub-block: a *block* whose body is segmented recursively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxRule {
    pub kind: StatementKind,
    pub opener: Token,
    #[serde(default)]
    pub closer: Option<Token>,
    #[serde(default)]
    pub has_sub_block: bool,
    #[serde(default)]
    pub sub_block_opener: Option<Token>,
    /// Escape marker inside string-literal regions
    #[serde(default)]
    pub escape: Option<char>,
}

impl SyntaxRule {
    /// Comment or string-literal region
    pub fn region(kind: StatementKind, opener: &str, closer: &str) -> Self {
        Self {
            kind,
            opener: Token::literal(opener),
            closer: Some(Token::literal(closer)),
            has_sub_block: false,
            sub_block_opener: None,
            escape: None,
        }
    }

    /// Closer-less prefix (`public`, `abstract`)
    pub fn marker(kind: StatementKind, opener: &str) -> Self {
        Self {
            kind,
            opener: Token::literal(opener),
            closer: None,
            has_sub_block: false,
            sub_block_opener: None,
            escape: None,
        }
    }

    /// Statement running from its opener to `closer`
    pub fn simple(kind: StatementKind, opener: Token, closer: &str) -> Self {
        Self {
            kind,
            opener,
            closer: Some(Token::literal(closer)),
            has_sub_block: false,
            sub_block_opener: None,
            escape: None,
        }
    }

    /// Statement with a body between `sub_block_opener` and `closer`
    pub fn block(kind: StatementKind, opener: &str, sub_block_opener: &str, closer: &str) -> Self {
        Self {
            kind,
            opener: Token::literal(opener),
            closer: Some(Token::literal(closer)),
            has_sub_block: true,
            sub_block_opener: Some(Token::literal(sub_block_opener)),
            escape: None,
        }
    }

    #[must_use]
    pub fn with_escape(mut self, escape: char) -> Self {
        self.escape = Some(escape);
        self
    }

    #[must_use]
    pub const fn is_region(&self) -> bool {
        self.kind.is_region()
    }

    #[must_use]
    pub fn is_marker(&self) -> bool {
        !self.is_region() && self.closer.is_none()
    }

    #[must_use]
    pub fn is_block(&self) -> bool {
        !self.is_region() && self.has_sub_block && self.closer.is_some()
    }

    #[must_use]
    pub fn closer_str(&self) -> Option<&str> {
        self.closer.as_ref().and_then(Token::as_literal)
    }

    #[must_use]
    pub fn sub_block_opener_str(&self) -> Option<&str> {
        self.sub_block_opener.as_ref().and_then(Token::as_literal)
    }

    fn validate(&self, index: usize) -> Result<()> {
        let fail = |msg: &str| {
            SegmentError::invalid_rules(format!("rule #{index} ({}): {msg}", self.kind))
        };

        for token in [Some(&self.opener), self.closer.as_ref(), self.sub_block_opener.as_ref()]
            .into_iter()
            .flatten()
        {
            if token.as_literal().is_some_and(str::is_empty) {
                return Err(fail("empty literal token"));
            }
        }
        if self.closer.as_ref().is_some_and(|t| t.as_literal().is_none()) {
            return Err(fail("closer must be a literal"));
        }
        if self.sub_block_opener.as_ref().is_some_and(|t| t.as_literal().is_none()) {
            return Err(fail("sub-block opener must be a literal"));
        }
        if self.has_sub_block != self.sub_block_opener.is_some() {
            return Err(fail("has_sub_block and sub_block_opener disagree"));
        }

        if self.is_region() {
            if self.opener.as_literal().is_none() {
                return Err(fail("region opener must be a literal"));
            }
            if self.closer.is_none() {
                return Err(fail("region needs a closer"));
            }
            if self.has_sub_block {
                return Err(fail("region cannot have a sub-block"));
            }
        } else {
            if self.has_sub_block && self.closer.is_none() {
                return Err(fail("block rule needs a closer"));
            }
            if self.escape.is_some() {
                return Err(fail("escape is only meaningful for regions"));
            }
        }

        Ok(())
    }
}

fn default_terminator() -> String {
    ";".to_string()
}

/// Ordered rule set driving one segmentation
///
/// Order matters: when two rules match at the same offset, the one declared
/// later wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<SyntaxRule>,
    /// Ends a block rule that turns out to have no body (`abstract function f();`)
    #[serde(default = "default_terminator")]
    pub terminator: String,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::c_like()
    }
}

impl RuleTable {
    pub fn new(rules: Vec<SyntaxRule>) -> Self {
        Self {
            rules,
            terminator: default_terminator(),
        }
    }

    /// Rule set for PHP-flavored C-like sources
    pub fn c_like() -> Self {
        use StatementKind as K;
        let ident = Token::literal;

        Self::new(vec![
            SyntaxRule::region(K::Comment, "//", "\n"),
            SyntaxRule::region(K::Comment, "/*", "*/"),
            SyntaxRule::region(K::Comment, "#", "\n"),
            SyntaxRule::region(K::StringLiteral, "'", "'").with_escape('\\'),
            SyntaxRule::region(K::StringLiteral, "\"", "\"").with_escape('\\'),
            SyntaxRule::marker(K::Variable, "global"),
            SyntaxRule::marker(K::Abstract, "abstract"),
            SyntaxRule::marker(K::Abstract, "final"),
            SyntaxRule::marker(K::Static, "static"),
            SyntaxRule::marker(K::Scope, "public"),
            SyntaxRule::marker(K::Scope, "protected"),
            SyntaxRule::marker(K::Scope, "private"),
            SyntaxRule::simple(K::Return, ident("return"), ";"),
            SyntaxRule::simple(K::Variable, ident("$"), ";"),
            SyntaxRule::simple(K::Constant, ident("const"), ";"),
            SyntaxRule::simple(K::Namespace, ident("namespace"), ";"),
            SyntaxRule::simple(K::Use, ident("use"), ";"),
            SyntaxRule::simple(K::Throw, ident("throw"), ";"),
            SyntaxRule::simple(K::Echo, ident("echo"), ";"),
            SyntaxRule::block(K::Function, "function", "{", "}"),
            SyntaxRule::block(K::Trait, "trait", "{", "}"),
            SyntaxRule::block(K::Interface, "interface", "{", "}"),
            SyntaxRule::block(K::Class, "class", "{", "}"),
            SyntaxRule::block(K::If, "if", "{", "}"),
            SyntaxRule::block(K::Else, "elseif", "{", "}"),
            SyntaxRule::block(K::Else, "else", "{", "}"),
            SyntaxRule::block(K::DoWhile, "do", "{", ";"),
            SyntaxRule::block(K::While, "while", "{", "}"),
            SyntaxRule::block(K::For, "for", "{", "}"),
            SyntaxRule::block(K::Foreach, "foreach", "{", "}"),
            SyntaxRule::block(K::Switch, "switch", "{", "}"),
            SyntaxRule::block(K::Try, "try", "{", "}"),
            SyntaxRule::block(K::Catch, "catch", "{", "}"),
            SyntaxRule::block(K::Finally, "finally", "{", "}"),
            SyntaxRule::simple(K::Constant, Token::UppercaseIdent, ";"),
            SyntaxRule::simple(K::Call, Token::LowercaseIdent, ";"),
        ])
    }

    /// Parse a TOML rule table and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: Self = toml::from_str(text)
            .map_err(|e| SegmentError::config_parse(format!("rule table: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyntaxRule> {
        self.rules.iter()
    }

    /// Comment and string-literal rules, in declared order
    pub fn region_rules(&self) -> impl Iterator<Item = &SyntaxRule> {
        self.rules.iter().filter(|rule| rule.is_region())
    }

    /// Rules that produce candidates, in declared order
    pub fn candidate_rules(&self) -> impl Iterator<Item = &SyntaxRule> {
        self.rules.iter().filter(|rule| !rule.is_region())
    }

    /// Last-declared call-statement rule, used by the correction pass
    #[must_use]
    pub fn call_rule(&self) -> Option<&SyntaxRule> {
        self.candidate_rules()
            .filter(|rule| rule.kind == StatementKind::Call && !rule.is_block())
            .last()
    }

    /// Word-like literal openers; call predicates never fire on these
    #[must_use]
    pub fn keywords(&self) -> HashSet<String> {
        self.candidate_rules()
            .filter_map(|rule| rule.opener.as_literal())
            .filter(|text| text.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_'))
            .map(str::to_string)
            .collect()
    }

    /// Check every rule for opener/closer consistency
    pub fn validate(&self) -> Result<()> {
        if self.terminator.is_empty() {
            return Err(SegmentError::invalid_rules("terminator must not be empty"));
        }
        if self.candidate_rules().next().is_none() {
            return Err(SegmentError::invalid_rules("table has no statement rules"));
        }
        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate(index)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_like_table_is_valid() {
        assert!(RuleTable::c_like().validate().is_ok());
    }

    #[test]
    fn test_rule_roles() {
        let table = RuleTable::c_like();
        let by_opener = |text: &str| {
            table
                .iter()
                .find(|r| r.opener.as_literal() == Some(text))
                .unwrap()
        };

        assert!(by_opener("//").is_region());
        assert!(by_opener("public").is_marker());
        assert!(!by_opener("$").is_marker());
        assert!(!by_opener("$").is_block());
        assert!(by_opener("function").is_block());
        assert_eq!(by_opener("do").closer_str(), Some(";"));
    }

    #[test]
    fn test_call_rule_and_keywords() {
        let table = RuleTable::c_like();
        assert_eq!(table.call_rule().map(|r| &r.opener), Some(&Token::LowercaseIdent));

        let keywords = table.keywords();
        assert!(keywords.contains("if"));
        assert!(keywords.contains("foreach"));
        assert!(!keywords.contains("$"));
        assert!(!keywords.contains("//"));
    }

    #[test]
    fn test_validation_rejects_inconsistent_rules() {
        let mut table = RuleTable::c_like();
        table.rules.push(SyntaxRule {
            has_sub_block: true,
            ..SyntaxRule::marker(StatementKind::Class, "struct")
        });
        assert!(matches!(table.validate(), Err(SegmentError::InvalidRules(_))));

        let mut table = RuleTable::c_like();
        table.rules[0].closer = None;
        assert!(table.validate().is_err());

        let table = RuleTable::new(vec![SyntaxRule::region(StatementKind::Comment, "#", "\n")]);
        assert!(table.validate().is_err());

        let mut table = RuleTable::c_like();
        table.rules.push(SyntaxRule::simple(StatementKind::Echo, Token::literal(""), ";"));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let table = RuleTable::from_toml_str(
            r#"
[[rules]]
kind = "comment"
opener = { literal = "--" }
closer = { literal = "\n" }

[[rules]]
kind = "variable"
opener = { literal = "let" }
closer = { literal = ";" }

[[rules]]
kind = "function"
opener = { literal = "fn" }
closer = { literal = "}" }
has_sub_block = true
sub_block_opener = { literal = "{" }

[[rules]]
kind = "call"
opener = "lowercase_ident"
closer = { literal = ";" }
"#,
        )
        .unwrap();

        assert_eq!(table.rules.len(), 4);
        assert_eq!(table.terminator, ";");
        assert!(table.rules[2].is_block());
        assert!(table.call_rule().is_some());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(StatementKind::DoWhile.as_str(), "do_while");
        assert_eq!(StatementKind::Call.to_string(), "call");
        assert!(StatementKind::Trait.holds_methods());
        assert!(!StatementKind::Function.holds_methods());
    }
}

//! Lenient SQL lexer producing a nested token tree.
//!
//! Tokens come from the [sqlparser](https://docs.rs/sqlparser/) tokenizer and are
//! tagged with a coarse lexical category. Parenthesized regions become child
//! groups so callers can scan a statement either flat (top-level tokens only)
//! or deep (every nesting level).
//!
//! The lexer never fails: when the tokenizer rejects the input (unterminated
//! string, stray quote, ...) the offending character is kept as punctuation and
//! tokenizing resumes right after it. After [`MAX_TOKENIZER_RESUMES`] restarts
//! the remainder goes through a single-pass fallback scanner, so the total work
//! stays linear in the input length.
//!
//! A keyword-like word directly followed by `(` is a function call
//! (`REPLACE(name, 'a', 'b')`) and a word next to a `.` is part of a qualified
//! name (`t.update`); both are tagged [`Category::Name`].

use sqlparser::dialect::Dialect;
use sqlparser::keywords::{ALL_KEYWORDS, Keyword};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer, Whitespace};

/// Maximum depth of parenthesized groups. Deeper parentheses are kept as
/// flat punctuation leaves.
pub const MAX_GROUP_DEPTH: usize = 256;

/// Tokenizer restarts after errors before the fallback scanner takes over.
pub const MAX_TOKENIZER_RESUMES: usize = 8;

/// Keywords that stay keywords when directly followed by `(`.
const KEYWORDS_BEFORE_PAREN: &[&str] = &["CASE", "IN", "VALUES", "USING", "FROM", "AS"];

/// Words tagged as DML.
const DML_WORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT", "REPLACE",
];

/// Words tagged as DDL.
const DDL_WORDS: &[&str] = &["CREATE", "ALTER", "DROP", "TRUNCATE", "RENAME"];

/// Words that are keywords even where the tokenizer's keyword table lacks them.
const EXTRA_KEYWORDS: &[&str] = &["GRANT", "REVOKE", "WITH"];

/// Lexical category of a leaf token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Keyword,
    Dml,
    Ddl,
    Name,
    Literal,
    Whitespace,
    Comment,
    Punctuation,
}

impl Category {
    /// True for the categories recognised as SQL keywords.
    pub fn is_keyword(self) -> bool {
        matches!(self, Self::Keyword | Self::Dml | Self::Ddl)
    }

    pub fn is_trivia(self) -> bool {
        matches!(self, Self::Whitespace | Self::Comment)
    }
}

/// A single token with its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub category: Category,
    pub text: String,
}

impl Lexeme {
    fn new(category: Category, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }

    /// Upper-cased token text.
    pub fn normalized(&self) -> String {
        self.text.to_uppercase()
    }

    fn is_punct(&self, text: &str) -> bool {
        self.category == Category::Punctuation && self.text == text
    }
}

/// Node of the token tree: a leaf token or a parenthesized group.
///
/// A group keeps its opening and closing parentheses as its first and last
/// children (the closing one is missing when the input never closes it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenNode {
    Leaf(Lexeme),
    Group(Vec<TokenNode>),
}

impl TokenNode {
    /// Category of a leaf; `None` for groups.
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Leaf(lexeme) => Some(lexeme.category),
            Self::Group(_) => None,
        }
    }

    pub fn is_keyword(&self) -> bool {
        self.category().is_some_and(Category::is_keyword)
    }

    /// Full source text of the node, including every nested group.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Leaf(lexeme) => out.push_str(&lexeme.text),
                Self::Group(children) => stack.extend(children.iter().rev()),
            }
        }
        out
    }

    /// Upper-cased source text of the node.
    pub fn normalized(&self) -> String {
        self.text().to_uppercase()
    }

    /// All leaves below this node in source order.
    pub fn leaves(&self) -> Vec<&Lexeme> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Self::Leaf(lexeme) => out.push(lexeme),
                Self::Group(children) => stack.extend(children.iter().rev()),
            }
        }
        out
    }
}

/// One `;`-terminated statement as a list of top-level nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlStatement {
    pub tokens: Vec<TokenNode>,
}

impl SqlStatement {
    fn is_blank(&self) -> bool {
        self.tokens
            .iter()
            .all(|node| node.category().is_some_and(Category::is_trivia))
    }
}

/// Tokenize `sql` and split it into statements.
///
/// Statements consisting only of whitespace and comments are dropped, so
/// empty input yields no statements.
pub fn parse_statements(sql: &str, dialect: &dyn Dialect) -> Vec<SqlStatement> {
    let mut builder = TreeBuilder::default();
    for lexeme in tokenize_lenient(sql, dialect) {
        builder.push(lexeme);
    }
    builder.finish()
}

/// Tokenize with error recovery.
fn tokenize_lenient(sql: &str, dialect: &dyn Dialect) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let mut rest = sql;
    let mut resumes = 0;

    loop {
        let mut buf: Vec<TokenWithSpan> = Vec::new();
        let outcome = Tokenizer::new(dialect, rest).tokenize_with_location_into_buf(&mut buf);
        let Err(err) = outcome else {
            lexemes.extend(buf.iter().filter_map(|t| classify(&t.token)));
            break;
        };

        let resume_at = buf
            .last()
            .map(|t| byte_offset(rest, t.span.end))
            .unwrap_or(0);
        lexemes.extend(buf.iter().filter_map(|t| classify(&t.token)));

        let tail = &rest[resume_at..];
        let Some(bad) = tail.chars().next() else {
            break;
        };
        lexemes.push(Lexeme::new(Category::Punctuation, bad.to_string()));
        rest = &tail[bad.len_utf8()..];

        resumes += 1;
        if resumes >= MAX_TOKENIZER_RESUMES {
            tracing::trace!(error = %err, remaining = rest.len(), "Tokenizer keeps failing, scanning the rest directly");
            lexemes.extend(scan_fallback(rest));
            break;
        }
        tracing::trace!(error = %err, "Tokenizer error, resuming after offending character");
    }

    retag_names(&mut lexemes);
    lexemes
}

/// Convert a tokenizer location (1-based line and character column) into a
/// byte offset into `text`.
fn byte_offset(text: &str, location: Location) -> usize {
    let (mut line, mut column) = (1u64, 1u64);
    for (idx, ch) in text.char_indices() {
        if line == location.line && column == location.column {
            return idx;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    text.len()
}

fn word_category(upper: &str, known_keyword: bool) -> Category {
    if DML_WORDS.contains(&upper) {
        Category::Dml
    } else if DDL_WORDS.contains(&upper) {
        Category::Ddl
    } else if known_keyword || EXTRA_KEYWORDS.contains(&upper) {
        Category::Keyword
    } else {
        Category::Name
    }
}

fn classify(token: &Token) -> Option<Lexeme> {
    let lexeme = match token {
        Token::EOF => return None,
        Token::Word(word) if word.quote_style.is_none() => {
            let upper = word.value.to_uppercase();
            let category = word_category(&upper, word.keyword != Keyword::NoKeyword);
            Lexeme::new(category, word.value.clone())
        }
        Token::Word(_) => Lexeme::new(Category::Name, token.to_string()),
        Token::Whitespace(ws) => {
            let category = match ws {
                Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_) => {
                    Category::Comment
                }
                _ => Category::Whitespace,
            };
            Lexeme::new(category, ws.to_string())
        }
        Token::Number(..)
        | Token::SingleQuotedString(_)
        | Token::DoubleQuotedString(_)
        | Token::NationalStringLiteral(_)
        | Token::EscapedStringLiteral(_)
        | Token::HexStringLiteral(_)
        | Token::DollarQuotedString(_) => Lexeme::new(Category::Literal, token.to_string()),
        _ => Lexeme::new(Category::Punctuation, token.to_string()),
    };
    Some(lexeme)
}

/// Tag keyword-like words used as function names or qualified name parts as
/// [`Category::Name`].
fn retag_names(lexemes: &mut [Lexeme]) {
    for idx in 0..lexemes.len() {
        if !lexemes[idx].category.is_keyword() {
            continue;
        }
        let call = lexemes.get(idx + 1).is_some_and(|next| next.is_punct("("))
            && !KEYWORDS_BEFORE_PAREN.contains(&lexemes[idx].normalized().as_str());
        let after_dot = idx > 0 && lexemes[idx - 1].is_punct(".");
        let before_dot = lexemes[idx + 1..]
            .iter()
            .find(|l| l.category != Category::Whitespace)
            .is_some_and(|l| l.is_punct("."));
        if call || after_dot || before_dot {
            lexemes[idx].category = Category::Name;
        }
    }
}

/// Single pass over input the tokenizer keeps rejecting.
///
/// Splits whitespace runs, comments, quoted runs, words and single punctuation
/// characters. A quote or comment opener without a closing delimiter becomes
/// punctuation; each missing delimiter is searched for at most once.
fn scan_fallback(text: &str) -> Vec<Lexeme> {
    let mut lexemes = Vec::new();
    let mut missing: Vec<&'static str> = Vec::new();
    let mut pos = 0;

    while let Some(ch) = text[pos..].chars().next() {
        let rest = &text[pos..];
        let quote = match ch {
            '\'' => Some(("'", Category::Literal)),
            '"' => Some(("\"", Category::Name)),
            '`' => Some(("`", Category::Name)),
            _ => None,
        };

        let (category, len) = if ch.is_whitespace() {
            (Category::Whitespace, prefix_len(rest, char::is_whitespace))
        } else if rest.starts_with("--") {
            (
                Category::Comment,
                rest.find('\n').map_or(rest.len(), |idx| idx + 1),
            )
        } else if rest.starts_with("/*") {
            match closing_len(rest, 2, "*/", &mut missing) {
                Some(len) => (Category::Comment, len),
                None => (Category::Punctuation, 1),
            }
        } else if let Some((close, category)) = quote {
            match closing_len(rest, 1, close, &mut missing) {
                Some(len) => (category, len),
                None => (Category::Punctuation, 1),
            }
        } else if is_word_char(ch) {
            let len = prefix_len(rest, is_word_char);
            let word = &rest[..len];
            let category = if word.starts_with(|c: char| c.is_ascii_digit()) {
                Category::Literal
            } else {
                let upper = word.to_uppercase();
                word_category(&upper, ALL_KEYWORDS.binary_search(&upper.as_str()).is_ok())
            };
            (category, len)
        } else {
            (Category::Punctuation, ch.len_utf8())
        };

        lexemes.push(Lexeme::new(category, &rest[..len]));
        pos += len;
    }

    lexemes
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

/// Byte length of the longest prefix of `text` whose chars satisfy `pred`.
fn prefix_len(text: &str, pred: impl Fn(char) -> bool) -> usize {
    text.char_indices()
        .find(|(_, ch)| !pred(*ch))
        .map_or(text.len(), |(idx, _)| idx)
}

/// Length of `rest` through the first `close` found after the opener.
fn closing_len(
    rest: &str,
    open_len: usize,
    close: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<usize> {
    if missing.contains(&close) {
        return None;
    }
    match rest[open_len..].find(close) {
        Some(idx) => Some(open_len + idx + close.len()),
        None => {
            missing.push(close);
            None
        }
    }
}

/// Stack-based tree construction.
#[derive(Default)]
struct TreeBuilder {
    statements: Vec<SqlStatement>,
    /// Open groups; the bottom entry is the statement's top level.
    open: Vec<Vec<TokenNode>>,
    /// Opening parentheses beyond `MAX_GROUP_DEPTH` kept flat.
    overflow: usize,
}

impl TreeBuilder {
    fn push(&mut self, lexeme: Lexeme) {
        if self.open.is_empty() {
            self.open.push(Vec::new());
        }

        match lexeme.text.as_str() {
            "(" if lexeme.category == Category::Punctuation => {
                if self.open.len() > MAX_GROUP_DEPTH {
                    self.overflow += 1;
                    self.leaf(lexeme);
                } else {
                    self.open.push(vec![TokenNode::Leaf(lexeme)]);
                }
            }
            ")" if lexeme.category == Category::Punctuation => {
                if self.overflow > 0 {
                    self.overflow -= 1;
                    self.leaf(lexeme);
                } else if self.open.len() > 1 {
                    self.leaf(lexeme);
                    self.close_group();
                } else {
                    self.leaf(lexeme);
                }
            }
            ";" if lexeme.category == Category::Punctuation => {
                self.close_all();
                self.leaf(lexeme);
                self.end_statement();
            }
            _ => self.leaf(lexeme),
        }
    }

    fn leaf(&mut self, lexeme: Lexeme) {
        if let Some(current) = self.open.last_mut() {
            current.push(TokenNode::Leaf(lexeme));
        }
    }

    fn close_group(&mut self) {
        if self.open.len() > 1 {
            if let Some(group) = self.open.pop() {
                if let Some(parent) = self.open.last_mut() {
                    parent.push(TokenNode::Group(group));
                }
            }
        }
    }

    fn close_all(&mut self) {
        while self.open.len() > 1 {
            self.close_group();
        }
        self.overflow = 0;
    }

    fn end_statement(&mut self) {
        let tokens = self.open.pop().unwrap_or_default();
        let statement = SqlStatement { tokens };
        if !statement.is_blank() {
            self.statements.push(statement);
        }
    }

    fn finish(mut self) -> Vec<SqlStatement> {
        if !self.open.is_empty() {
            self.close_all();
            self.end_statement();
        }
        self.statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::dialect::GenericDialect;

    fn parse(sql: &str) -> Vec<SqlStatement> {
        parse_statements(sql, &GenericDialect {})
    }

    #[test]
    fn test_empty_input_has_no_statements() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\t").is_empty());
        assert!(parse("-- just a comment\n").is_empty());
    }

    #[test]
    fn test_splits_on_semicolons() {
        let statements = parse("SELECT 1; SELECT 2;");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].tokens.last().unwrap().text(), ";");
    }

    #[test]
    fn test_parentheses_become_groups() {
        let statements = parse("SELECT * FROM (SELECT 1) t");
        let groups: Vec<_> = statements[0]
            .tokens
            .iter()
            .filter(|n| matches!(n, TokenNode::Group(_)))
            .collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].text(), "(SELECT 1)");
    }

    #[test]
    fn test_categories() {
        let statements = parse("INSERT INTO my_table VALUES ('x') -- c");
        let leaves: Vec<_> = statements[0]
            .tokens
            .iter()
            .filter_map(|n| match n {
                TokenNode::Leaf(l) => Some(l.clone()),
                TokenNode::Group(_) => None,
            })
            .collect();
        assert_eq!(leaves[0].category, Category::Dml);
        assert_eq!(leaves[2].category, Category::Keyword);
        assert_eq!(leaves[4].category, Category::Name);
        assert_eq!(leaves.last().unwrap().category, Category::Comment);
    }

    #[test]
    fn test_string_literal_is_not_keyword() {
        let statements = parse("SELECT 'DROP TABLE x'");
        let all: Vec<_> = statements[0].tokens.iter().flat_map(|n| n.leaves()).collect();
        let literal = all.iter().find(|l| l.text.contains("DROP")).unwrap();
        assert_eq!(literal.category, Category::Literal);
    }

    #[test]
    fn test_quoted_identifier_is_name() {
        let statements = parse("SELECT \"delete\" FROM t");
        let all: Vec<_> = statements[0].tokens.iter().flat_map(|n| n.leaves()).collect();
        let quoted = all.iter().find(|l| l.text.contains("delete")).unwrap();
        assert_eq!(quoted.category, Category::Name);
    }

    #[test]
    fn test_unterminated_string_recovers() {
        let statements = parse("SELECT 'oops; DROP TABLE users");
        let words: Vec<String> = statements
            .iter()
            .flat_map(|s| s.tokens.iter().flat_map(|n| n.leaves()))
            .filter(|l| l.category.is_keyword())
            .map(|l| l.normalized())
            .collect();
        assert!(words.contains(&"DROP".to_string()), "{words:?}");
    }

    #[test]
    fn test_unbalanced_parentheses_do_not_panic() {
        assert_eq!(parse(")))SELECT 1").len(), 1);
        assert_eq!(parse("SELECT ((((1").len(), 1);
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let sql = format!("{}DELETE{}", "(".repeat(10_000), ")".repeat(10_000));
        let statements = parse(&sql);
        assert_eq!(statements.len(), 1);
        let text: String = statements[0].tokens.iter().map(TokenNode::text).collect();
        assert_eq!(text, sql);
    }

    fn leaf_categories(sql: &str) -> Vec<(String, Category)> {
        parse(sql)
            .iter()
            .flat_map(|s| s.tokens.iter().flat_map(|n| n.leaves()))
            .filter(|l| !l.category.is_trivia())
            .map(|l| (l.normalized(), l.category))
            .collect()
    }

    fn category_of(sql: &str, word: &str) -> Category {
        leaf_categories(sql)
            .into_iter()
            .find(|(text, _)| text == word)
            .map(|(_, category)| category)
            .unwrap()
    }

    #[test]
    fn test_function_calls_are_names() {
        assert_eq!(
            category_of("SELECT REPLACE(name, 'a', 'b') FROM t", "REPLACE"),
            Category::Name
        );
        assert_eq!(category_of("SELECT INSERT(s, 1, 2, 'x')", "INSERT"), Category::Name);
        assert_eq!(category_of("SELECT TRUNCATE(price, 2)", "TRUNCATE"), Category::Name);
        // a space before the parenthesis keeps the keyword
        assert_eq!(category_of("INSERT INTO t (a) VALUES (1)", "INSERT"), Category::Dml);
        assert_eq!(category_of("SELECT * FROM t WHERE a IN(1, 2)", "IN"), Category::Keyword);
        assert_eq!(category_of("INSERT INTO t VALUES(1)", "VALUES"), Category::Keyword);
    }

    #[test]
    fn test_qualified_name_parts_are_names() {
        assert_eq!(category_of("SELECT t.update FROM t", "UPDATE"), Category::Name);
        assert_eq!(category_of("SELECT delete . x FROM delete", "DELETE"), Category::Name);
    }

    #[test]
    fn test_create_or_replace_stays_keyword() {
        let sql = "CREATE OR REPLACE TABLE t (a INT)";
        assert_eq!(category_of(sql, "CREATE"), Category::Ddl);
        assert_eq!(category_of(sql, "REPLACE"), Category::Dml);
    }

    #[test]
    fn test_fallback_scanner_categories() {
        let lexemes = scan_fallback("DROP my_table 'x' \"q\" -- c\n/* d */ 42 ' /*");
        let pairs: Vec<(&str, Category)> = lexemes
            .iter()
            .filter(|l| l.category != Category::Whitespace)
            .map(|l| (l.text.as_str(), l.category))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("DROP", Category::Ddl),
                ("my_table", Category::Name),
                ("'x'", Category::Literal),
                ("\"q\"", Category::Name),
                ("-- c\n", Category::Comment),
                ("/* d */", Category::Comment),
                ("42", Category::Literal),
                ("'", Category::Punctuation),
                ("/", Category::Punctuation),
                ("*", Category::Punctuation),
            ]
        );
        let text: String = lexemes.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(text, "DROP my_table 'x' \"q\" -- c\n/* d */ 42 ' /*");
    }

    #[test]
    fn test_repeated_errors_switch_to_fallback() {
        let sql = format!(
            "SELECT 1 {}; DROP TABLE x",
            "/* ".repeat(MAX_TOKENIZER_RESUMES * 4)
        );
        let statements = parse(&sql);
        let text: String = statements
            .iter()
            .flat_map(|s| s.tokens.iter().map(TokenNode::text))
            .collect();
        assert_eq!(text, sql);
        let keywords: Vec<String> = leaf_categories(&sql)
            .into_iter()
            .filter(|(_, c)| c.is_keyword())
            .map(|(t, _)| t)
            .collect();
        assert!(keywords.contains(&"DROP".to_string()), "{keywords:?}");
    }

    #[test]
    fn test_unterminated_comments_tokenize_in_linear_time() {
        let sql = format!("SELECT 1 {}", "/* ".repeat(20_000));
        let started = std::time::Instant::now();
        let statements = parse(&sql);
        assert!(
            started.elapsed() < std::time::Duration::from_secs(5),
            "took {:?}",
            started.elapsed()
        );
        let text: String = statements[0].tokens.iter().map(TokenNode::text).collect();
        assert_eq!(text, sql);
    }

    #[test]
    fn test_byte_offset_multiline_and_unicode() {
        let text = "é\nab";
        assert_eq!(byte_offset(text, Location { line: 1, column: 2 }), 2);
        assert_eq!(byte_offset(text, Location { line: 2, column: 2 }), 4);
        assert_eq!(byte_offset(text, Location { line: 9, column: 9 }), text.len());
    }
}

//! Write-intent classification for SQL text.
//!
//! [`SqlWriteClassifier`] decides, without executing anything, whether a SQL
//! string performs a mutating operation (DML writes, DDL, DCL), including
//! writes hidden inside a `WITH` clause. The `read_query` tool uses the verdict
//! to refuse anything that could modify data or schema.
//!
//! The analysis is a lexical scan over a token tree, not a full parse. It
//! errs on the side of reporting a write:
//!
//! - keywords nested at any depth (sub-selects, function arguments) count as
//!   if they were top-level;
//! - after a `WITH` keyword, any top-level token whose upper-cased text merely
//!   *contains* a write keyword marks a CTE write (`"CREATED_AT"` matches
//!   `CREATE`), while the general scan requires an exact keyword match.
//!
//! String literals, quoted identifiers and comments never match the general
//! scan because they are not keyword tokens.

pub mod lexer;

use crate::models::Platform;
use lexer::{Category, SqlStatement, TokenNode};
use serde::Serialize;
use sqlparser::dialect::{Dialect, GenericDialect, SnowflakeDialect};
use std::collections::BTreeSet;

/// DML keywords that write data.
pub const DML_WRITE_KEYWORDS: [&str; 6] = ["INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT", "REPLACE"];

/// DDL keywords.
pub const DDL_KEYWORDS: [&str; 5] = ["CREATE", "ALTER", "DROP", "TRUNCATE", "RENAME"];

/// DCL keywords.
pub const DCL_KEYWORDS: [&str; 2] = ["GRANT", "REVOKE"];

/// Marker added to `write_operations` when a write is found after `WITH`.
pub const CTE_WRITE_MARKER: &str = "CTE_WRITE";

static SNOWFLAKE_DIALECT: SnowflakeDialect = SnowflakeDialect {};
static GENERIC_DIALECT: GenericDialect = GenericDialect {};

/// Iterate over every write keyword of the taxonomy.
pub fn write_keywords() -> impl Iterator<Item = &'static str> {
    DML_WRITE_KEYWORDS
        .into_iter()
        .chain(DDL_KEYWORDS)
        .chain(DCL_KEYWORDS)
}

/// Exact (case-insensitive) membership in the write taxonomy.
pub fn is_write_keyword(word: &str) -> bool {
    let upper = word.to_uppercase();
    write_keywords().any(|kw| kw == upper)
}

/// Verdict produced by [`SqlWriteClassifier::analyze`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// True if any write was found anywhere in the input.
    pub contains_write: bool,
    /// Distinct upper-cased write keywords, plus [`CTE_WRITE_MARKER`].
    pub write_operations: BTreeSet<String>,
    /// True if a write keyword followed a top-level `WITH`.
    pub has_cte_write: bool,
}

/// Stateless SQL write detector.
///
/// Construct once and share; `analyze` takes `&self` and holds no per-query
/// state, so concurrent calls never interfere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlWriteClassifier {
    platform: Platform,
}

impl SqlWriteClassifier {
    /// Create a classifier tokenizing with the dialect of `platform`.
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    fn dialect(&self) -> &'static dyn Dialect {
        match self.platform {
            Platform::Snowflake => &SNOWFLAKE_DIALECT,
            Platform::Clickzetta => &GENERIC_DIALECT,
        }
    }

    /// Analyze `sql` for write operations.
    ///
    /// Never fails: unparseable input degrades to a best-effort scan.
    ///
    /// # Examples
    ///
    /// ```
    /// use warehouse_mcp_server::classifier::SqlWriteClassifier;
    ///
    /// let classifier = SqlWriteClassifier::default();
    /// assert!(!classifier.analyze("SELECT * FROM users").contains_write);
    ///
    /// let verdict = classifier.analyze("delete from users where id = 1");
    /// assert!(verdict.contains_write);
    /// assert!(verdict.write_operations.contains("DELETE"));
    /// ```
    pub fn analyze(&self, sql: &str) -> ClassificationResult {
        let statements = lexer::parse_statements(sql, self.dialect());

        let mut write_operations = BTreeSet::new();
        let mut has_cte_write = false;

        for statement in &statements {
            if has_cte(statement) && cte_contains_write(statement) {
                has_cte_write = true;
                write_operations.insert(CTE_WRITE_MARKER.to_string());
            }
            write_operations.extend(find_write_operations(statement));
        }

        ClassificationResult {
            contains_write: !write_operations.is_empty() || has_cte_write,
            write_operations,
            has_cte_write,
        }
    }
}

/// Whether the statement's top level holds a `WITH` keyword.
fn has_cte(statement: &SqlStatement) -> bool {
    statement
        .tokens
        .iter()
        .any(|node| node.is_keyword() && node.normalized() == "WITH")
}

/// Flat scan of the top-level tokens after the first `WITH`, using substring
/// containment against the write taxonomy.
fn cte_contains_write(statement: &SqlStatement) -> bool {
    let mut in_cte = false;
    for node in &statement.tokens {
        let normalized = node.normalized();
        if node.is_keyword() && normalized == "WITH" {
            in_cte = true;
        } else if in_cte && write_keywords().any(|kw| normalized.contains(kw)) {
            return true;
        }
    }
    false
}

/// Deep scan of every keyword token, using exact matches.
fn find_write_operations(statement: &SqlStatement) -> BTreeSet<String> {
    let mut operations = BTreeSet::new();
    let mut stack: Vec<&TokenNode> = statement.tokens.iter().rev().collect();

    while let Some(node) = stack.pop() {
        match node {
            TokenNode::Group(children) => stack.extend(children.iter().rev()),
            TokenNode::Leaf(lexeme) => {
                if lexeme.category.is_trivia() {
                    continue;
                }
                if matches!(
                    lexeme.category,
                    Category::Keyword | Category::Dml | Category::Ddl
                ) {
                    let normalized = lexeme.normalized();
                    if is_write_keyword(&normalized) {
                        operations.insert(normalized);
                    }
                }
            }
        }
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(sql: &str) -> ClassificationResult {
        SqlWriteClassifier::default().analyze(sql)
    }

    fn ops(result: &ClassificationResult) -> Vec<&str> {
        result.write_operations.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_taxonomy_is_disjoint() {
        let all: Vec<_> = write_keywords().collect();
        let unique: BTreeSet<_> = all.iter().collect();
        assert_eq!(all.len(), 13);
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_plain_select_is_read_only() {
        let result = analyze("SELECT a, b FROM t WHERE a > 1 ORDER BY b");
        assert_eq!(result, ClassificationResult::default());
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(analyze(""), ClassificationResult::default());
        assert_eq!(analyze("   "), ClassificationResult::default());
    }

    #[test]
    fn test_insert_detected() {
        let result = analyze("INSERT INTO t VALUES (1)");
        assert!(result.contains_write);
        assert_eq!(ops(&result), vec!["INSERT"]);
        assert!(!result.has_cte_write);
    }

    #[test]
    fn test_lowercase_matches_uppercase() {
        assert_eq!(
            analyze("insert into t values (1)"),
            analyze("INSERT INTO t VALUES (1)")
        );
    }

    #[test]
    fn test_read_only_cte() {
        let result = analyze("WITH cte AS (SELECT 1) SELECT * FROM cte");
        assert!(!result.contains_write);
        assert!(!result.has_cte_write);
    }

    #[test]
    fn test_write_inside_cte() {
        let result = analyze("WITH cte AS (INSERT INTO t VALUES (1)) SELECT * FROM cte");
        assert!(result.contains_write);
        assert!(result.has_cte_write);
        assert!(result.write_operations.contains(CTE_WRITE_MARKER));
        assert!(result.write_operations.contains("INSERT"));
    }

    #[test]
    fn test_cte_scan_uses_substring_match() {
        // `created_at` is not a keyword, so only the CTE scan reports it
        let result = analyze("WITH c AS (SELECT created_at FROM t) SELECT * FROM c");
        assert!(result.has_cte_write);
        assert_eq!(ops(&result), vec![CTE_WRITE_MARKER]);
    }

    #[test]
    fn test_general_scan_uses_exact_match() {
        let result = analyze("SELECT created_at, updated_by FROM t");
        assert!(!result.contains_write);
    }

    #[test]
    fn test_nested_write_detected() {
        let result = analyze("SELECT * FROM t WHERE x IN (SELECT y FROM (DELETE FROM z) sub)");
        assert!(result.contains_write);
        assert!(result.write_operations.contains("DELETE"));
    }

    #[test]
    fn test_literal_does_not_match() {
        let result = analyze("SELECT 'DROP TABLE users' AS s");
        assert!(!result.contains_write);
    }

    #[test]
    fn test_comment_does_not_match() {
        let result = analyze("SELECT 1 -- DROP TABLE users\n/* DELETE FROM x */");
        assert!(!result.contains_write);
    }

    #[test]
    fn test_multiple_statements_union() {
        let result = analyze("SELECT 1; DROP TABLE a; GRANT SELECT ON t TO r");
        assert_eq!(ops(&result), vec!["DROP", "GRANT"]);
    }

    #[test]
    fn test_has_cte_write_from_any_statement() {
        let result = analyze("SELECT 1; WITH x AS (DELETE FROM t) SELECT 2");
        assert!(result.has_cte_write);
    }

    #[test]
    fn test_every_keyword_detected() {
        for kw in write_keywords() {
            let sql = format!("{kw} something");
            let result = analyze(&sql);
            assert!(result.contains_write, "{kw} not detected");
            assert!(result.write_operations.contains(kw), "{kw} missing");
        }
    }

    #[test]
    fn test_is_write_keyword() {
        assert!(is_write_keyword("truncate"));
        assert!(!is_write_keyword("SELECT"));
        assert!(!is_write_keyword("INSERTED"));
    }

    #[test]
    fn test_default_follows_default_platform() {
        assert_eq!(SqlWriteClassifier::default().platform(), Platform::default());
        assert_eq!(
            SqlWriteClassifier::new(Platform::Clickzetta).platform(),
            Platform::Clickzetta
        );
    }

    #[test]
    fn test_function_calls_are_not_writes() {
        for sql in [
            "SELECT REPLACE(name, 'a', 'b') FROM t",
            "SELECT INSERT(s, 1, 2, 'x') FROM t",
            "SELECT TRUNCATE(price, 2) FROM t",
        ] {
            assert_eq!(analyze(sql), ClassificationResult::default(), "{sql}");
        }
        assert_eq!(ops(&analyze("INSERT INTO t (a) VALUES (1)")), vec!["INSERT"]);
    }

    #[test]
    fn test_create_or_replace_detected() {
        let result = analyze("CREATE OR REPLACE TABLE t (a INT)");
        assert_eq!(ops(&result), vec!["CREATE", "REPLACE"]);
    }

    #[test]
    fn test_snowflake_dialect() {
        let classifier = SqlWriteClassifier::new(Platform::Snowflake);
        assert!(classifier.analyze("MERGE INTO t USING s ON t.id = s.id").contains_write);
        assert!(!classifier.analyze("SELECT $1 FROM @stage").contains_write);
    }
}

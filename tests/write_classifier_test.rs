//! Behavioural tests for the SQL write classifier.
//!
//! Covers keyword detection across statement shapes, CTE handling, purity
//! under concurrent use, and random or hostile input that must never panic.

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use warehouse_mcp_server::classifier::{
    ClassificationResult, DCL_KEYWORDS, DDL_KEYWORDS, DML_WRITE_KEYWORDS, SqlWriteClassifier,
};
use warehouse_mcp_server::models::Platform;

fn classifiers() -> [SqlWriteClassifier; 2] {
    [
        SqlWriteClassifier::new(Platform::Snowflake),
        SqlWriteClassifier::new(Platform::Clickzetta),
    ]
}

fn no_write() -> ClassificationResult {
    ClassificationResult::default()
}

#[test]
fn top_level_write_keywords_are_reported() {
    let statements = [
        ("INSERT", "INSERT INTO t VALUES (1)"),
        ("UPDATE", "UPDATE t SET a = 1"),
        ("DELETE", "DELETE FROM t WHERE a = 1"),
        ("MERGE", "MERGE INTO t USING s ON t.id = s.id WHEN MATCHED THEN DELETE"),
        ("UPSERT", "UPSERT INTO t VALUES (1)"),
        ("REPLACE", "REPLACE INTO t VALUES (1)"),
        ("CREATE", "CREATE TABLE t (a INT)"),
        ("ALTER", "ALTER TABLE t ADD COLUMN b INT"),
        ("DROP", "DROP TABLE t"),
        ("TRUNCATE", "TRUNCATE TABLE t"),
        ("RENAME", "RENAME TABLE a TO b"),
        ("GRANT", "GRANT SELECT ON t TO analyst"),
        ("REVOKE", "REVOKE SELECT ON t FROM analyst"),
    ];

    for classifier in classifiers() {
        for (keyword, sql) in statements {
            let result = classifier.analyze(sql);
            assert!(result.contains_write, "{sql}");
            assert!(
                result.write_operations.contains(keyword),
                "{keyword} missing for {sql}: {:?}",
                result.write_operations
            );
            assert!(!result.has_cte_write, "{sql}");
        }
    }
}

#[test]
fn taxonomy_matches_statement_table() {
    let all: Vec<&str> = DML_WRITE_KEYWORDS
        .iter()
        .chain(DDL_KEYWORDS.iter())
        .chain(DCL_KEYWORDS.iter())
        .copied()
        .collect();
    assert_eq!(all.len(), 13);
}

#[test]
fn pure_selects_are_read_only() {
    let selects = [
        "SELECT 1",
        "SELECT * FROM orders",
        "select id, name from customers where id in (select customer_id from orders)",
        "SELECT COUNT(*) FROM t GROUP BY a HAVING COUNT(*) > 1 ORDER BY 1 LIMIT 10",
        "SELECT a FROM t1 JOIN t2 ON t1.id = t2.id",
        "SELECT 'DROP TABLE x' AS label",
        "SELECT 1 -- DELETE FROM t",
        "SELECT /* UPDATE t SET a = 1 */ 1",
        "SHOW TABLES",
        "DESC TABLE EXTENDED orders",
    ];
    for classifier in classifiers() {
        for sql in selects {
            assert_eq!(classifier.analyze(sql), no_write(), "{sql}");
        }
    }
}

#[test]
fn read_only_cte_is_allowed() {
    for classifier in classifiers() {
        let result = classifier.analyze("WITH cte AS (SELECT 1) SELECT * FROM cte");
        assert!(!result.contains_write);
        assert!(!result.has_cte_write);
    }
}

#[test]
fn write_inside_cte_is_flagged() {
    for classifier in classifiers() {
        let result = classifier.analyze("WITH cte AS (INSERT INTO t VALUES (1)) SELECT * FROM cte");
        assert!(result.contains_write);
        assert!(result.has_cte_write);
        assert!(result.write_operations.contains("CTE_WRITE"));
        assert!(result.write_operations.contains("INSERT"));
    }
}

#[test]
fn cte_scan_matches_substrings() {
    // A name that merely contains a write keyword still counts after WITH.
    let result = SqlWriteClassifier::default()
        .analyze("WITH recent AS (SELECT created_at FROM t) SELECT * FROM recent");
    assert!(result.has_cte_write);
    assert_eq!(
        result.write_operations.iter().collect::<Vec<_>>(),
        vec!["CTE_WRITE"]
    );

    // Outside a CTE the same name is harmless.
    let plain = SqlWriteClassifier::default().analyze("SELECT created_at FROM t");
    assert!(!plain.contains_write);
}

#[test]
fn nested_write_is_found() {
    for classifier in classifiers() {
        let result =
            classifier.analyze("SELECT * FROM t WHERE x IN (SELECT y FROM (DELETE FROM z) sub)");
        assert!(result.contains_write);
        assert!(result.write_operations.contains("DELETE"));
    }
}

#[test]
fn empty_and_blank_input() {
    for classifier in classifiers() {
        for sql in ["", "   ", "\n\t", ";", " ; ; ", "-- just a comment", "/* nothing */"] {
            assert_eq!(classifier.analyze(sql), no_write(), "{sql:?}");
        }
    }
}

#[test]
fn case_is_ignored() {
    for classifier in classifiers() {
        assert_eq!(
            classifier.analyze("insert into t values (1)"),
            classifier.analyze("INSERT INTO t VALUES (1)")
        );
        assert_eq!(
            classifier.analyze("InSeRt InTo t VaLuEs (1)"),
            classifier.analyze("INSERT INTO t VALUES (1)")
        );
    }
}

#[test]
fn results_aggregate_across_statements() {
    let result = SqlWriteClassifier::default()
        .analyze("SELECT 1; DROP TABLE a; WITH c AS (UPDATE b SET x = 1) SELECT 2");
    assert!(result.contains_write);
    assert!(result.has_cte_write);
    let ops: Vec<&str> = result.write_operations.iter().map(String::as_str).collect();
    assert_eq!(ops, vec!["CTE_WRITE", "DROP", "UPDATE"]);
}

#[test]
fn analyze_is_idempotent() {
    let classifier = SqlWriteClassifier::new(Platform::Snowflake);
    let sql = "WITH a AS (SELECT 1) MERGE INTO t USING a ON TRUE WHEN MATCHED THEN UPDATE SET x = 1";
    let first = classifier.analyze(sql);
    for _ in 0..10 {
        assert_eq!(classifier.analyze(sql), first);
    }
}

#[test]
fn concurrent_calls_do_not_interfere() {
    let classifier = Arc::new(SqlWriteClassifier::new(Platform::Clickzetta));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let classifier = Arc::clone(&classifier);
            thread::spawn(move || {
                for _ in 0..200 {
                    if i % 2 == 0 {
                        let result = classifier.analyze("SELECT * FROM t");
                        assert!(!result.contains_write);
                    } else {
                        let result = classifier.analyze("DELETE FROM t");
                        assert_eq!(
                            result.write_operations.iter().collect::<Vec<_>>(),
                            vec!["DELETE"]
                        );
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn hostile_input_never_panics() {
    let deep_parens = format!("{}SELECT 1{}", "(".repeat(5000), ")".repeat(5000));
    let unbalanced = "(".repeat(10_000);
    let inputs = [
        deep_parens.as_str(),
        unbalanced.as_str(),
        "SELECT 'unterminated",
        "SELECT \"unterminated",
        "/* unterminated comment",
        "\0\0\0",
        "SELECT \u{FFFF} FROM \u{1F600}",
        "$$ $tag$ ` [ ] { }",
        ")))) DROP TABLE x ((((",
    ];
    for classifier in classifiers() {
        for sql in inputs {
            let _ = classifier.analyze(sql);
        }
    }

    let result = SqlWriteClassifier::default().analyze(")))) DROP TABLE x ((((");
    assert!(result.write_operations.contains("DROP"));
}

#[test]
fn random_input_never_panics() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    let fragments = [
        "SELECT", "INSERT", "WITH", "(", ")", "'", "\"", "--", "/*", "*/", ";", ",", "FROM", "DROP",
        "x", "1", " ", "\n", "`", "$$", "MERGE", "AS",
    ];
    let classifier = SqlWriteClassifier::new(Platform::Snowflake);

    for _ in 0..500 {
        let len = rng.gen_range(0..40);
        let sql: String = (0..len)
            .map(|_| {
                if rng.gen_bool(0.2) {
                    let n = rng.gen_range(1..8);
                    (&mut rng)
                        .sample_iter(&Alphanumeric)
                        .take(n)
                        .map(char::from)
                        .collect::<String>()
                } else {
                    fragments.choose(&mut rng).copied().unwrap_or(" ").to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        let result = classifier.analyze(&sql);
        assert_eq!(
            result.contains_write,
            !result.write_operations.is_empty() || result.has_cte_write
        );
    }
}

#[test]
fn function_calls_named_like_keywords_are_reads() {
    let reads = [
        "SELECT REPLACE(name, 'a', 'b') FROM t",
        "SELECT INSERT(code, 1, 2, 'XY') FROM t",
        "SELECT TRUNCATE(price, 2) AS p FROM t",
        "SELECT id FROM t WHERE REPLACE(LOWER(name), ' ', '') = 'x'",
        "SELECT o.update, o.delete FROM orders o",
    ];
    for classifier in classifiers() {
        for sql in reads {
            assert_eq!(classifier.analyze(sql), no_write(), "{sql}");
        }

        let insert = classifier.analyze("INSERT INTO t (a) VALUES (1)");
        assert!(insert.write_operations.contains("INSERT"));
        let replace = classifier.analyze("CREATE OR REPLACE TABLE t (a INT)");
        assert!(replace.write_operations.contains("CREATE"));
        assert!(replace.write_operations.contains("REPLACE"));
    }
}

#[test]
fn pathological_input_stays_linear() {
    let unterminated = [
        format!("SELECT 1 {}", "/* ".repeat(30_000)),
        format!("SELECT 1 {}", "\" ' ".repeat(20_000)),
        format!("{}DROP TABLE x", "/*".repeat(30_000)),
    ];
    let classifier = SqlWriteClassifier::new(Platform::Snowflake);
    for sql in &unterminated {
        let started = std::time::Instant::now();
        let _ = classifier.analyze(sql);
        let elapsed = started.elapsed();
        assert!(
            elapsed < std::time::Duration::from_secs(5),
            "{} bytes took {elapsed:?}",
            sql.len()
        );
    }
}

#[test]
fn long_random_input_never_panics() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x10ad);
    let fragments = [
        "'", "\"", "/*", "*/", "--", "\n", "(", ")", ";", "REPLACE(", "DELETE", "x", " ", "`",
    ];
    let classifier = SqlWriteClassifier::new(Platform::Clickzetta);

    for _ in 0..5 {
        let len = rng.gen_range(2_000..6_000);
        let sql: String = (0..len)
            .map(|_| fragments.choose(&mut rng).copied().unwrap_or(" "))
            .collect();
        let result = classifier.analyze(&sql);
        assert_eq!(
            result.contains_write,
            !result.write_operations.is_empty() || result.has_cte_write
        );
    }
}

//! Guard behavior on generated and caller-supplied SQL.

use sql_agent_server::agent::guard::{BLOCKED_KEYWORDS, check};

#[test]
fn test_every_blocked_keyword_rejected() {
    for keyword in BLOCKED_KEYWORDS {
        let sql = format!("{} something", keyword.to_lowercase());
        let err = check(&sql).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.user_message().contains(keyword));
    }
}

#[test]
fn test_drop_table_company_rejected() {
    assert!(check("DROP TABLE company").is_err());
}

#[test]
fn test_plain_select_gets_limit() {
    assert_eq!(
        check("SELECT name, industry FROM company WHERE industry = 'Energy';").unwrap(),
        "SELECT name, industry FROM company WHERE industry = 'Energy' LIMIT 100"
    );
}

#[test]
fn test_guard_is_idempotent() {
    let once = check("select * from contacts").unwrap();
    let twice = check(&once).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.matches("LIMIT").count(), 1);
}

#[test]
fn test_count_query_left_alone() {
    assert_eq!(
        check("SELECT COUNT(*) AS total FROM company").unwrap(),
        "SELECT COUNT(*) AS total FROM company"
    );
}

#[test]
fn test_average_query_left_alone() {
    assert_eq!(
        check("SELECT AVG(budget) FROM projects").unwrap(),
        "SELECT AVG(budget) FROM projects"
    );
}

#[test]
fn test_non_select_passes_through() {
    assert_eq!(check("PRAGMA table_info(company)").unwrap(), "PRAGMA table_info(company)");
}

#[test]
fn test_literal_with_blocked_word_is_rejected() {
    // Substring matching does not look inside quotes
    assert!(check("SELECT * FROM company WHERE name = 'Created Labs'").is_err());
}

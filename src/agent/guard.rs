//! Keyword guard applied to every statement before execution.
//!
//! The check is a plain uppercase substring match, so identifiers or string
//! literals containing a blocked word (e.g. `'Updated Inc'`) are rejected too.

use crate::error::{AgentError, AgentResult};

/// Keywords that mark a statement as mutating or DDL.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE",
];

/// Row cap appended to open-ended selects.
pub const DEFAULT_LIMIT: u32 = 100;

const AGGREGATE_MARKERS: &[&str] = &["COUNT(", "SUM(", "AVG(", "GROUP BY"];

/// Validate a statement and return the text to execute.
///
/// # Examples
///
/// ```
/// use sql_agent_server::agent::guard::check;
///
/// assert_eq!(check("SELECT * FROM company").unwrap(), "SELECT * FROM company LIMIT 100");
/// assert!(check("DROP TABLE company").is_err());
/// ```
pub fn check(sql: &str) -> AgentResult<String> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(AgentError::validation("SQL query is empty"));
    }

    let upper = trimmed.to_uppercase();
    if let Some(keyword) = BLOCKED_KEYWORDS.iter().find(|k| upper.contains(*k)) {
        return Err(AgentError::validation(format!(
            "Query contains forbidden keyword {}. Only read-only queries are allowed.",
            keyword
        )));
    }

    let body = strip_trailing_comment(trimmed)
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    let body_upper = body.to_uppercase();
    let needs_limit = body_upper.contains("SELECT")
        && !body_upper.contains("LIMIT")
        && !AGGREGATE_MARKERS.iter().any(|m| body_upper.contains(m));
    if needs_limit {
        return Ok(format!("{} LIMIT {}", body, DEFAULT_LIMIT));
    }

    Ok(trimmed.to_string())
}

/// Byte offset of the first `needle` outside quoted literals and identifiers.
pub(crate) fn find_unquoted(sql: &str, needle: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
            None if sql[i..].starts_with(needle) => return Some(i),
            None => {}
        }
    }
    None
}

/// Drop a `--` comment running to the end of the last line.
fn strip_trailing_comment(sql: &str) -> &str {
    let line_start = sql.rfind('\n').map_or(0, |pos| pos + 1);
    match find_unquoted(&sql[line_start..], "--") {
        Some(pos) => &sql[..line_start + pos],
        None => sql,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_anywhere() {
        for sql in [
            "drop table company",
            "SELECT 1; DELETE FROM company",
            "WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x",
            "select * from company where name = 'Updated Inc'",
        ] {
            let err = check(sql).unwrap_err();
            assert_eq!(err.kind(), "validation", "{}", sql);
        }
    }

    #[test]
    fn test_limit_appended_once() {
        let guarded = check("SELECT name FROM company;  ").unwrap();
        assert_eq!(guarded, "SELECT name FROM company LIMIT 100");
        assert_eq!(check(&guarded).unwrap(), guarded);
    }

    #[test]
    fn test_existing_limit_untouched() {
        assert_eq!(
            check("SELECT * FROM projects LIMIT 5").unwrap(),
            "SELECT * FROM projects LIMIT 5"
        );
    }

    #[test]
    fn test_aggregates_not_limited() {
        assert_eq!(
            check("SELECT COUNT(*) FROM company").unwrap(),
            "SELECT COUNT(*) FROM company"
        );
        assert_eq!(
            check("select status, sum(budget) from projects group by status").unwrap(),
            "select status, sum(budget) from projects group by status"
        );
    }

    #[test]
    fn test_trailing_comment_does_not_hide_limit() {
        assert_eq!(
            check("SELECT * FROM company -- every company").unwrap(),
            "SELECT * FROM company LIMIT 100"
        );
        assert_eq!(
            check("SELECT *\nFROM company; -- no limit wanted").unwrap(),
            "SELECT *\nFROM company LIMIT 100"
        );
        assert_eq!(
            check("SELECT * FROM company WHERE name = 'A--B'").unwrap(),
            "SELECT * FROM company WHERE name = 'A--B' LIMIT 100"
        );
    }

    #[test]
    fn test_find_unquoted_skips_literals() {
        assert_eq!(find_unquoted("SELECT 'a;b'; SELECT 2", ";"), Some(12));
        assert_eq!(find_unquoted("SELECT \"x;y\" FROM t", ";"), None);
        assert_eq!(find_unquoted("SELECT 'it''s;' FROM t", ";"), None);
    }

    #[test]
    fn test_empty_rejected() {
        assert!(check("   ").is_err());
    }
}

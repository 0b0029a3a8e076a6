use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use askdb_core::{Error, Result};

/// Keywords that can begin a top-level SQL statement. Used to locate a
/// statement inside prose and to classify segments after splitting.
const STATEMENT_KEYWORDS: &[&str] = &[
    "select", "with", "insert", "update", "delete", "drop", "alter", "create", "truncate",
    "grant", "revoke", "replace", "merge", "pragma", "attach", "detach", "vacuum", "call",
    "set", "begin", "commit", "rollback", "explain",
];

/// Extract exactly one SQL statement from untrusted model output and
/// verify it is read-only. This is the single safety boundary between
/// the model and the executor.
pub fn extract_and_guard(response: &str) -> Result<String> {
    let sql = extract_statement(response)?;
    guard_read_only(&sql)?;
    Ok(sql)
}

/// Locate the single SQL statement in a model response, tolerating
/// markdown fences and surrounding prose.
pub fn extract_statement(response: &str) -> Result<String> {
    let candidate = unfence(response);
    let start = find_statement_start(candidate).ok_or(Error::NoStatementFound)?;

    let segments: Vec<String> = split_statements(&candidate[start..])
        .into_iter()
        .filter(|segment| {
            leading_keyword(segment)
                .is_some_and(|keyword| STATEMENT_KEYWORDS.contains(&keyword.as_str()))
        })
        .collect();

    match segments.len() {
        0 => Err(Error::NoStatementFound),
        1 => Ok(segments.into_iter().next().unwrap_or_default()),
        _ => Err(Error::MultipleStatements),
    }
}

/// Reject anything that is not a single read-only query.
///
/// A keyword screen runs first so rejections name the offending verb;
/// statements that pass it are then parsed and must come out as exactly
/// one `Statement::Query` (which covers `WITH ... SELECT`). Statements
/// the generic parser cannot handle fall back to the keyword screen's
/// verdict rather than being accepted blind.
pub fn guard_read_only(sql: &str) -> Result<()> {
    let stripped = strip_leading_trivia(sql);
    let keyword = leading_keyword(stripped).ok_or(Error::NoStatementFound)?;

    match keyword.as_str() {
        "select" => {}
        "with" => {
            if !contains_word(stripped, "select") {
                return Err(Error::UnsafeStatement(
                    "WITH clause without a SELECT body".to_string(),
                ));
            }
        }
        other => {
            return Err(Error::UnsafeStatement(format!(
                "statement begins with {}",
                other.to_uppercase()
            )));
        }
    }

    match Parser::parse_sql(&GenericDialect {}, stripped) {
        Ok(statements) => {
            if statements.len() != 1 {
                return Err(Error::MultipleStatements);
            }
            match &statements[0] {
                Statement::Query(query) if query_is_read_only(query) => Ok(()),
                _ => Err(Error::UnsafeStatement(
                    "statement parses to a non-read-only form".to_string(),
                )),
            }
        }
        // Plain SELECTs that the generic parser rejects fall back to the
        // keyword screen's verdict; a WITH statement it cannot parse may
        // hide a write in its body, so those are rejected.
        Err(_) if keyword == "with" => Err(Error::UnsafeStatement(
            "unparsable WITH statement".to_string(),
        )),
        Err(_) => Ok(()),
    }
}

/// `SELECT ... INTO` and set-expression bodies that wrap INSERT/UPDATE
/// are writes even though the statement parses as a query.
fn query_is_read_only(query: &Query) -> bool {
    fn body_is_read_only(body: &SetExpr) -> bool {
        match body {
            SetExpr::Select(select) => select.into.is_none(),
            SetExpr::Query(inner) => body_is_read_only(&inner.body),
            SetExpr::SetOperation { left, right, .. } => {
                body_is_read_only(left) && body_is_read_only(right)
            }
            SetExpr::Values(_) | SetExpr::Table(_) => true,
            _ => false,
        }
    }
    body_is_read_only(&query.body)
}

/// If the response carries a fenced code block, return its body;
/// otherwise the trimmed response.
fn unfence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text.trim();
    };
    let after = &text[open + 3..];
    let body = match after.find('\n') {
        // Language tag occupies the rest of the fence line.
        Some(newline) => &after[newline + 1..],
        None => {
            let after = after.trim_start();
            after
                .strip_prefix("sql")
                .or_else(|| after.strip_prefix("SQL"))
                .unwrap_or(after)
        }
    };
    let end = body.find("```").unwrap_or(body.len());
    body[..end].trim()
}

/// Byte offset of the first statement keyword, scanning line starts
/// first and falling back to a word-boundary scan for keywords buried
/// mid-line in prose.
fn find_statement_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let rest = &text[offset..];
        let stripped = strip_leading_trivia(rest);
        if leading_keyword(stripped)
            .is_some_and(|keyword| STATEMENT_KEYWORDS.contains(&keyword.as_str()))
        {
            let skipped = rest.len() - stripped.len();
            return Some(offset + skipped);
        }
        offset += line.len();
    }

    let lower = text.to_lowercase();
    let bytes = lower.as_bytes();
    for (idx, _) in lower.char_indices() {
        if idx > 0 && is_word_byte(bytes[idx - 1]) {
            continue;
        }
        for keyword in STATEMENT_KEYWORDS {
            if lower[idx..].starts_with(keyword) {
                let end = idx + keyword.len();
                if bytes.get(end).is_none_or(|b| !is_word_byte(*b)) {
                    return Some(idx);
                }
            }
        }
    }
    None
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Split on semicolons that sit outside quotes and comments, dropping
/// empty segments.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while let Some(c) = chars.next() {
        if in_line_comment {
            current.push(c);
            if c == '\n' {
                in_line_comment = false;
            }
            continue;
        }
        if in_block_comment {
            current.push(c);
            if c == '*' && chars.peek() == Some(&'/') {
                current.push(chars.next().unwrap_or('/'));
                in_block_comment = false;
            }
            continue;
        }
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                in_line_comment = true;
                current.push(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                in_block_comment = true;
                current.push(c);
            }
            ';' => statements.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|statement| statement.trim().to_string())
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Skip leading whitespace, `--` line comments, and `/* */` blocks.
fn strip_leading_trivia(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if text.starts_with("--") {
            match text.find('\n') {
                Some(idx) => text = &text[idx + 1..],
                None => return "",
            }
        } else if text.starts_with("/*") {
            match text.find("*/") {
                Some(idx) => text = &text[idx + 2..],
                None => return "",
            }
        } else {
            return text;
        }
    }
}

fn leading_keyword(statement: &str) -> Option<String> {
    let stripped = strip_leading_trivia(statement);
    let word: String = stripped
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    (!word.is_empty()).then(|| word.to_ascii_lowercase())
}

fn contains_word(text: &str, word: &str) -> bool {
    let lower = text.to_lowercase();
    let bytes = lower.as_bytes();
    let mut from = 0;
    while let Some(found) = lower[from..].find(word) {
        let idx = from + found;
        let end = idx + word.len();
        let before_ok = idx == 0 || !is_word_byte(bytes[idx - 1]);
        let after_ok = bytes.get(end).is_none_or(|b| !is_word_byte(*b));
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_select() {
        let sql = extract_and_guard("SELECT * FROM customers").unwrap();
        assert_eq!(sql, "SELECT * FROM customers");
    }

    #[test]
    fn accepts_lowercase_and_trailing_semicolon() {
        let sql = extract_and_guard("select id from orders;").unwrap();
        assert_eq!(sql, "select id from orders");
    }

    #[test]
    fn accepts_comment_prefixed_select() {
        let response = "-- total per customer\n/* generated */\nSELECT COUNT(*) FROM orders";
        assert!(extract_and_guard(response).is_ok());
    }

    #[test]
    fn accepts_cte_select() {
        let response =
            "WITH totals AS (SELECT customer_id, COUNT(*) n FROM orders GROUP BY customer_id)\n\
             SELECT * FROM totals";
        assert!(extract_and_guard(response).is_ok());
    }

    #[test]
    fn unwraps_markdown_fences() {
        let response = "Here is the query:\n```sql\nSELECT name FROM customers\n```\nEnjoy!";
        let sql = extract_and_guard(response).unwrap();
        assert_eq!(sql, "SELECT name FROM customers");
    }

    #[test]
    fn skips_leading_prose() {
        let response = "Sure, this answers the question.\nSELECT name FROM customers";
        let sql = extract_and_guard(response).unwrap();
        assert_eq!(sql, "SELECT name FROM customers");
    }

    #[test]
    fn rejects_every_write_keyword() {
        let cases = [
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET a = 1",
            "DELETE FROM t",
            "DROP TABLE customers",
            "ALTER TABLE t ADD COLUMN x INT",
            "CREATE TABLE t (id INT)",
            "TRUNCATE TABLE t",
            "GRANT ALL ON t TO public",
        ];
        for case in cases {
            let err = extract_and_guard(case).unwrap_err();
            assert_eq!(err.kind(), "unsafe_statement", "case: {case}");
        }
    }

    #[test]
    fn rejects_embedded_drop() {
        let response = "I cannot answer that, but here you go:\nDROP TABLE customers;";
        let err = extract_and_guard(response).unwrap_err();
        assert_eq!(err.kind(), "unsafe_statement");
        assert!(err.to_string().contains("DROP"));
    }

    #[test]
    fn rejects_multi_statement_payload() {
        let err = extract_and_guard("SELECT 1; DROP TABLE customers").unwrap_err();
        assert_eq!(err.kind(), "multiple_statements");
    }

    #[test]
    fn quoted_semicolons_do_not_split() {
        let sql = extract_and_guard("SELECT ';' AS sep FROM customers").unwrap();
        assert_eq!(sql, "SELECT ';' AS sep FROM customers");
    }

    #[test]
    fn semicolon_inside_comment_does_not_split() {
        let response = "SELECT id -- note; not a separator\nFROM orders";
        assert!(extract_and_guard(response).is_ok());
    }

    #[test]
    fn rejects_cte_that_feeds_an_insert() {
        let response = "WITH src AS (SELECT 1 AS x) INSERT INTO t SELECT x FROM src";
        let err = extract_and_guard(response).unwrap_err();
        assert_eq!(err.kind(), "unsafe_statement");
    }

    #[test]
    fn rejects_select_into() {
        let err = extract_and_guard("SELECT * INTO backup FROM customers").unwrap_err();
        assert_eq!(err.kind(), "unsafe_statement");
    }

    #[test]
    fn prose_only_response_has_no_statement() {
        let err = extract_and_guard("I could not find a relevant table.").unwrap_err();
        assert_eq!(err.kind(), "no_statement_found");
        assert_eq!(extract_and_guard("").unwrap_err().kind(), "no_statement_found");
    }

    #[test]
    fn fence_without_newline_still_extracts() {
        let sql = extract_and_guard("```sql SELECT 1```").unwrap();
        assert_eq!(sql, "SELECT 1");
    }
}

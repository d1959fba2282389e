//! # SELECT Template Scanner
//!
//! Splits a SELECT template into its top-level clauses so that WHERE, ORDER
//! BY and LIMIT can be extended per request. Keywords are recognised only
//! outside quotes and at parenthesis depth zero, so subqueries stay opaque.

/// Top-level clauses of a SELECT template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectClauses {
    /// Everything before the first clause keyword (`SELECT ... FROM ... JOIN ...`)
    pub head: String,
    pub where_clause: Option<String>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<String>,
    /// Locking suffix such as `FOR UPDATE`
    pub tail: Option<String>,
    /// Top-level UNION present: the template must be treated as a derived table
    pub compound: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Tail,
}

/// Scan a template into clauses
pub fn split_select(sql: &str) -> SelectClauses {
    let sql = strip_terminator(sql);
    let mut marks: Vec<(usize, usize, Clause)> = Vec::new();
    let mut compound = false;

    for (start, word) in top_level_words(sql) {
        let upper = word.to_ascii_uppercase();
        let end = start + word.len();
        let clause = match upper.as_str() {
            "WHERE" => Some((Clause::Where, end)),
            "HAVING" => Some((Clause::Having, end)),
            "LIMIT" => Some((Clause::Limit, end)),
            "GROUP" | "ORDER" => followed_by(sql, end, "BY").map(|by_end| {
                let clause = if upper == "GROUP" {
                    Clause::GroupBy
                } else {
                    Clause::OrderBy
                };
                (clause, by_end)
            }),
            "FOR" | "LOCK" => Some((Clause::Tail, start)),
            "UNION" => {
                compound = true;
                None
            }
            _ => None,
        };
        if let Some((clause, body_start)) = clause {
            if !marks.iter().any(|(_, _, c)| *c == clause) {
                marks.push((start, body_start, clause));
            }
        }
    }

    if compound {
        return SelectClauses {
            head: sql.trim().to_string(),
            compound: true,
            ..Default::default()
        };
    }

    marks.sort_by_key(|(start, _, _)| *start);

    let head_end = marks.first().map(|(start, _, _)| *start).unwrap_or(sql.len());
    let mut clauses = SelectClauses {
        head: sql[..head_end].trim().to_string(),
        ..Default::default()
    };

    for (i, (_, body_start, clause)) in marks.iter().enumerate() {
        let body_end = marks
            .get(i + 1)
            .map(|(next, _, _)| *next)
            .unwrap_or(sql.len());
        let body = sql[*body_start..body_end].trim().to_string();
        if body.is_empty() {
            continue;
        }
        let slot = match clause {
            Clause::Where => &mut clauses.where_clause,
            Clause::GroupBy => &mut clauses.group_by,
            Clause::Having => &mut clauses.having,
            Clause::OrderBy => &mut clauses.order_by,
            Clause::Limit => &mut clauses.limit,
            Clause::Tail => &mut clauses.tail,
        };
        *slot = Some(body);
    }
    clauses
}

/// Count `?` placeholders outside string literals
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(_) if c == '\\' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}

fn strip_terminator(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

/// Byte offset of the end of `word` if it is the next word after `from`
fn followed_by(sql: &str, from: usize, word: &str) -> Option<usize> {
    let rest = &sql[from..];
    let skipped = rest.len() - rest.trim_start().len();
    let candidate = &rest[skipped..];
    let matches = candidate
        .get(..word.len())
        .map(|prefix| prefix.eq_ignore_ascii_case(word))
        .unwrap_or(false);
    if matches {
        let end = from + skipped + word.len();
        let boundary = sql[end..]
            .chars()
            .next()
            .map(|c| !is_ident_char(c))
            .unwrap_or(true);
        if boundary {
            return Some(end);
        }
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Words that sit at parenthesis depth zero, outside quotes
fn top_level_words(sql: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut word_start: Option<usize> = None;

    for (i, c) in sql.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if is_ident_char(c) {
            if word_start.is_none() {
                word_start = Some(i);
            }
            continue;
        }

        if let Some(start) = word_start.take() {
            if depth == 0 {
                words.push((start, &sql[start..i]));
            }
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    if let Some(start) = word_start {
        if depth == 0 && quote.is_none() {
            words.push((start, &sql[start..]));
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_select() {
        let clauses = split_select(
            "SELECT id, title FROM books b JOIN authors a ON a.id = b.author_id \
             WHERE b.active = ? GROUP BY b.id HAVING COUNT(*) > 1 ORDER BY b.title DESC LIMIT 5, 20",
        );
        assert_eq!(
            clauses.head,
            "SELECT id, title FROM books b JOIN authors a ON a.id = b.author_id"
        );
        assert_eq!(clauses.where_clause.as_deref(), Some("b.active = ?"));
        assert_eq!(clauses.group_by.as_deref(), Some("b.id"));
        assert_eq!(clauses.having.as_deref(), Some("COUNT(*) > 1"));
        assert_eq!(clauses.order_by.as_deref(), Some("b.title DESC"));
        assert_eq!(clauses.limit.as_deref(), Some("5, 20"));
        assert!(!clauses.compound);
    }

    #[test]
    fn test_multibyte_after_group_keyword() {
        let clauses = split_select("SELECT * FROM t ORDER €€ LIMIT 2");
        assert_eq!(clauses.order_by, None);
        assert_eq!(clauses.limit.as_deref(), Some("2"));

        let clauses = split_select("SELECT * FROM t GROUP ü");
        assert_eq!(clauses.group_by, None);
    }

    #[test]
    fn test_subquery_keywords_ignored() {
        let clauses = split_select(
            "SELECT * FROM (SELECT id FROM t WHERE x = 1 ORDER BY id LIMIT 3) q WHERE q.id > ?",
        );
        assert_eq!(
            clauses.head,
            "SELECT * FROM (SELECT id FROM t WHERE x = 1 ORDER BY id LIMIT 3) q"
        );
        assert_eq!(clauses.where_clause.as_deref(), Some("q.id > ?"));
        assert_eq!(clauses.limit, None);
    }

    #[test]
    fn test_keywords_in_literals_ignored() {
        let clauses = split_select("SELECT 'a WHERE b' AS label FROM t where `limit` = ?;");
        assert_eq!(clauses.head, "SELECT 'a WHERE b' AS label FROM t");
        assert_eq!(clauses.where_clause.as_deref(), Some("`limit` = ?"));
        assert_eq!(clauses.limit, None);
    }

    #[test]
    fn test_locking_tail() {
        let clauses = split_select("SELECT * FROM seats WHERE id = ? LIMIT 1 FOR UPDATE");
        assert_eq!(clauses.limit.as_deref(), Some("1"));
        assert_eq!(clauses.tail.as_deref(), Some("FOR UPDATE"));
    }

    #[test]
    fn test_union_is_compound() {
        let clauses = split_select("SELECT id FROM a UNION SELECT id FROM b");
        assert!(clauses.compound);
        assert_eq!(clauses.head, "SELECT id FROM a UNION SELECT id FROM b");
    }

    #[test]
    fn test_count_placeholders_skips_literals() {
        assert_eq!(count_placeholders("a = ? AND b = '?' AND c IN (?, ?)"), 3);
        assert_eq!(count_placeholders("x = 'it\\'s ?' AND y = ?"), 1);
    }
}

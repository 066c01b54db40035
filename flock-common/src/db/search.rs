//! Free-text search clauses
//!
//! A search term matches when any of the listed columns contains it,
//! case-insensitively for ASCII. `%`, `_` and `\` in the term are literal.

use sqlx::{QueryBuilder, Sqlite};

/// Term with LIKE metacharacters escaped by `\`
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Trimmed term, `None` when blank
pub fn term(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}

/// Push `(a LIKE ? ESCAPE '\' OR b LIKE ? ESCAPE '\' ...)`
pub fn push_contains(qb: &mut QueryBuilder<'_, Sqlite>, columns: &[&str], term: &str) {
    let pattern = format!("%{}%", escape_like(term));
    qb.push("(");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(*column)
            .push(" LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\'");
    }
    qb.push(")");
}

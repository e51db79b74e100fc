//! Call-escape and marker translation for postgres.
//!
//! - `{call p(?, ?)}` becomes `CALL p($1, $2)`
//! - `{? = call f(?)}` becomes `SELECT f($1)`; JDBC parameter 1 is the
//!   return value, so `$n` stands for parameter `n + 1`
//! - `?` markers become `$n`; quoted text and comments are left alone

use crate::render::{MarkerKind, scan};

/// A `{call ...}` escape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Routine {
    pub name: String,
    /// `{? = call ...}`: the first JDBC parameter is the return value.
    pub returns: bool,
}

/// SQL ready for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Translated {
    pub sql: String,
    /// JDBC parameters the caller may bind, including a return slot.
    pub params: usize,
    /// JDBC index of `$1` minus one.
    pub offset: usize,
    pub routine: Option<Routine>,
}

impl Translated {
    /// Server parameter count.
    pub fn server_params(&self) -> usize {
        self.params - self.offset
    }
}

fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &s[keyword.len()..];
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' => None,
        _ => Some(rest.trim_start()),
    }
}

/// Split `{...}` call escapes into a routine and its argument text.
fn parse_escape(sql: &str) -> Option<(Routine, &str)> {
    let inner = sql.trim().strip_prefix('{')?.strip_suffix('}')?.trim();

    let (returns, rest) = match inner.strip_prefix('?') {
        Some(after) => {
            let after = after.trim_start().strip_prefix('=')?.trim_start();
            (true, strip_keyword(after, "call")?)
        }
        None => (false, strip_keyword(inner, "call")?),
    };

    let name_end = rest.find('(').unwrap_or(rest.len());
    let name = rest[..name_end].trim();
    if name.is_empty() {
        return None;
    }
    Some((
        Routine {
            name: name.to_string(),
            returns,
        },
        rest,
    ))
}

/// Replace `?` markers with `$1..$n`. Returns the SQL and the marker count.
fn number_markers(sql: &str) -> (String, usize) {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut last = 0;
    let mut count = 0;
    let mut highest = 0;
    for marker in scan(sql) {
        match marker.kind {
            MarkerKind::Positional(i) => {
                out.push_str(&sql[last..marker.start]);
                out.push('$');
                out.push_str(&i.to_string());
                last = marker.end;
                count = i;
            }
            MarkerKind::Numbered(i) => highest = highest.max(i),
            MarkerKind::Named(_) => {}
        }
    }
    out.push_str(&sql[last..]);
    (out, count.max(highest))
}

/// Translate `sql` for a prepared or callable statement.
pub(crate) fn translate(sql: &str) -> Translated {
    match parse_escape(sql) {
        Some((routine, body)) => {
            let body = if body.contains('(') {
                body.to_string()
            } else {
                format!("{body}()")
            };
            let (numbered, count) = number_markers(&body);
            let (sql, offset) = if routine.returns {
                (format!("SELECT {numbered}"), 1)
            } else {
                (format!("CALL {numbered}"), 0)
            };
            Translated {
                sql,
                params: count + offset,
                offset,
                routine: Some(routine),
            }
        }
        None => {
            let (sql, params) = number_markers(sql);
            Translated {
                sql,
                params,
                offset: 0,
                routine: None,
            }
        }
    }
}

/// Translate call escapes in plain-statement SQL. `?` is left alone.
pub(crate) fn translate_plain(sql: &str) -> String {
    match parse_escape(sql) {
        Some((routine, body)) => {
            let keyword = if routine.returns { "SELECT" } else { "CALL" };
            if body.contains('(') {
                format!("{keyword} {body}")
            } else {
                format!("{keyword} {body}()")
            }
        }
        None => sql.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_escape_becomes_call() {
        let t = translate("{call test_proc(?,?,?)}");
        assert_eq!(t.sql, "CALL test_proc($1,$2,$3)");
        assert_eq!(t.params, 3);
        assert_eq!(t.offset, 0);
        assert_eq!(t.routine.unwrap().name, "test_proc");
    }

    #[test]
    fn function_escape_becomes_select() {
        let t = translate("{ ? = call add_one(?) }");
        assert_eq!(t.sql, "SELECT add_one($1)");
        assert_eq!(t.params, 2);
        assert_eq!(t.offset, 1);
        assert_eq!(t.server_params(), 1);
        assert!(t.routine.unwrap().returns);
    }

    #[test]
    fn call_without_arguments_gets_parentheses() {
        assert_eq!(translate("{CALL refresh}").sql, "CALL refresh()");
        assert_eq!(translate_plain("{call refresh}"), "CALL refresh()");
    }

    #[test]
    fn plain_sql_markers_are_numbered() {
        let t = translate("SELECT * FROM t WHERE a = ? AND b = '?' AND c = ?");
        assert_eq!(t.sql, "SELECT * FROM t WHERE a = $1 AND b = '?' AND c = $2");
        assert_eq!(t.params, 2);
        assert!(t.routine.is_none());
    }

    #[test]
    fn numbered_markers_pass_through() {
        let t = translate("SELECT $1::int + $2");
        assert_eq!(t.sql, "SELECT $1::int + $2");
        assert_eq!(t.params, 2);
    }

    #[test]
    fn escape_strings_and_identifiers_are_not_numbered() {
        let t = translate(r"SELECT E'a\'?', col$1 FROM t WHERE id = ?");
        assert_eq!(t.sql, r"SELECT E'a\'?', col$1 FROM t WHERE id = $1");
        assert_eq!(t.params, 1);
    }

    #[test]
    fn non_call_braces_are_untouched() {
        let t = translate("{fn now()}");
        assert_eq!(t.sql, "{fn now()}");
        assert!(t.routine.is_none());
        assert_eq!(translate_plain("{callx}"), "{callx}");
    }
}

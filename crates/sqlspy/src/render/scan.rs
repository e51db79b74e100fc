//! Parameter marker scanner.
//!
//! Finds `?` (sequential), `$n` (numbered) and `:name` markers in SQL text,
//! skipping quoted literals (including backslash escapes in `E'...'`),
//! quoted identifiers, dollar-quoted bodies and comments. `??` is the JDBC
//! escape for a literal `?` and `::` is a cast; neither is a marker. `$n` and
//! `:name` glued to a preceding identifier (`col$1`, `arr[lo:hi]`) are part
//! of the surrounding SQL, not markers.

/// What kind of parameter a marker refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    /// `?`, numbered by order of occurrence starting at 1.
    Positional(usize),
    /// `$n`, carrying its explicit 1-based index.
    Numbered(usize),
    /// `:name`.
    Named(String),
}

/// A marker and its byte span in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub start: usize,
    pub end: usize,
    pub kind: MarkerKind,
}

impl Marker {
    /// The 1-based parameter index, for positional and numbered markers.
    pub fn index(&self) -> Option<usize> {
        match self.kind {
            MarkerKind::Positional(i) | MarkerKind::Numbered(i) => Some(i),
            MarkerKind::Named(_) => None,
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Whether the byte before `i` continues an identifier or subscript.
fn follows_word(bytes: &[u8], i: usize) -> bool {
    i > 0 && (is_ident_char(bytes[i - 1]) || bytes[i - 1] == b'$' || bytes[i - 1] == b']')
}

/// Whether the quote at `i` opens an `E'...'` escape string.
fn is_escape_string(bytes: &[u8], i: usize) -> bool {
    i > 0 && matches!(bytes[i - 1], b'E' | b'e') && !follows_word(bytes, i - 1)
}

/// Skip a quoted run starting at `i` (the opening quote). Doubled quotes
/// escape; with `backslash`, so does `\`. Returns the index just past the
/// closing quote.
fn skip_quoted(bytes: &[u8], i: usize, quote: u8, backslash: bool) -> usize {
    let mut j = i + 1;
    while j < bytes.len() {
        if backslash && bytes[j] == b'\\' {
            j += 2;
            continue;
        }
        if bytes[j] == quote {
            if j + 1 < bytes.len() && bytes[j + 1] == quote {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    bytes.len()
}

/// Try to skip a dollar-quoted body (`$$...$$` or `$tag$...$tag$`) at `i`.
fn skip_dollar_quoted(sql: &str, i: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut j = i + 1;
    if j < bytes.len() && is_ident_start(bytes[j]) {
        while j < bytes.len() && is_ident_char(bytes[j]) {
            j += 1;
        }
    }
    if j >= bytes.len() || bytes[j] != b'$' {
        return None;
    }
    let tag = &sql[i..=j];
    let body_start = j + 1;
    match sql[body_start..].find(tag) {
        Some(pos) => Some(body_start + pos + tag.len()),
        None => Some(bytes.len()),
    }
}

/// Scan `sql` for parameter markers, in order of occurrence.
pub fn scan(sql: &str) -> Vec<Marker> {
    let bytes = sql.as_bytes();
    let mut markers = Vec::new();
    let mut ordinal = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = skip_quoted(bytes, i, b'\'', is_escape_string(bytes, i)),
            b'"' => i = skip_quoted(bytes, i, b'"', false),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = match sql[i..].find('\n') {
                    Some(pos) => i + pos + 1,
                    None => bytes.len(),
                };
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match sql[i + 2..].find("*/") {
                    Some(pos) => i + 2 + pos + 2,
                    None => bytes.len(),
                };
            }
            b'?' => {
                if bytes.get(i + 1) == Some(&b'?') {
                    i += 2;
                    continue;
                }
                ordinal += 1;
                markers.push(Marker {
                    start: i,
                    end: i + 1,
                    kind: MarkerKind::Positional(ordinal),
                });
                i += 1;
            }
            b'$' if follows_word(bytes, i) => i += 1,
            b'$' => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                if j > i + 1 {
                    // Digits only; parse cannot fail short of overflow.
                    if let Ok(index) = sql[i + 1..j].parse::<usize>() {
                        markers.push(Marker {
                            start: i,
                            end: j,
                            kind: MarkerKind::Numbered(index),
                        });
                    }
                    i = j;
                } else if let Some(end) = skip_dollar_quoted(sql, i) {
                    i = end;
                } else {
                    i += 1;
                }
            }
            b':' => {
                if bytes.get(i + 1) == Some(&b':') {
                    i += 2;
                    continue;
                }
                let mut j = i + 1;
                if !follows_word(bytes, i) && j < bytes.len() && is_ident_start(bytes[j]) {
                    while j < bytes.len() && is_ident_char(bytes[j]) {
                        j += 1;
                    }
                    markers.push(Marker {
                        start: i,
                        end: j,
                        kind: MarkerKind::Named(sql[i + 1..j].to_string()),
                    });
                    i = j;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    markers
}

/// Number of distinct positional/numbered parameters the template expects.
pub fn parameter_count(sql: &str) -> usize {
    scan(sql).iter().filter_map(Marker::index).max().unwrap_or(0)
}

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::DbError;
use crate::value::{SqlValue, TIMESTAMP_FORMAT};

/// Connection parameters for a PostgreSQL database.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostgresDriver {
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub hostaddr: String,
    pub port: String,
    /// Raw connect string override; when set the parameters above are
    /// ignored.
    pub connect: Option<String>,
}

impl PostgresDriver {
    /// Renders a `key=value` conninfo string. Host defaults to 127.0.0.1
    /// and port to 5432; `hostaddr` takes precedence over both.
    #[must_use]
    pub fn connect_string(&self) -> String {
        if let Some(connect) = &self.connect {
            return connect.clone();
        }
        if !self.hostaddr.is_empty() {
            return format!(
                "dbname={} user={} password={} hostaddr={} sslmode=disable",
                self.dbname, self.user, self.password, self.hostaddr
            );
        }
        let host = if self.host.is_empty() {
            "127.0.0.1"
        } else {
            &self.host
        };
        let port = if self.port.is_empty() { "5432" } else { &self.port };
        format!(
            "dbname={} user={} password={} host={} port={} sslmode=disable",
            self.dbname, self.user, self.password, host, port
        )
    }
}

enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Rewrites bare `?` markers into `$1`, `$2`, ... for PostgreSQL.
///
/// Markers inside string literals, comments, and dollar-quoted blocks are
/// untouched. `$?` emits a literal `?` without consuming a position, which
/// is how callers spell operators like `?|` in rewritten SQL.
#[must_use]
pub(super) fn adapt_placeholders(sql: &str) -> Cow<'_, str> {
    let bytes = sql.as_bytes();
    // Holds the rewritten bytes once the first change is made; everything
    // appended is either a copied span of the input or ASCII.
    let mut out: Option<Vec<u8>> = None;
    let mut state = State::Normal;
    let mut seq = 0usize;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    copy_span(&mut out, bytes, idx, 2);
                    idx += 2;
                    continue;
                }
                b'$' => {
                    if bytes.get(idx + 1) == Some(&b'?') {
                        let buf = out.get_or_insert_with(|| bytes[..idx].to_vec());
                        buf.push(b'?');
                        idx += 2;
                        continue;
                    }
                    if let Some((tag, close)) = try_start_dollar_quote(bytes, idx) {
                        copy_span(&mut out, bytes, idx, close + 1 - idx);
                        state = State::DollarQuoted(tag);
                        idx = close + 1;
                        continue;
                    }
                }
                b'?' => {
                    seq += 1;
                    let buf = out.get_or_insert_with(|| bytes[..idx].to_vec());
                    buf.push(b'$');
                    buf.extend_from_slice(seq.to_string().as_bytes());
                    idx += 1;
                    continue;
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        copy_span(&mut out, bytes, idx, 2);
                        idx += 2;
                        continue;
                    }
                    state = State::Normal;
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        copy_span(&mut out, bytes, idx, 2);
                        idx += 2;
                        continue;
                    }
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    copy_span(&mut out, bytes, idx, 2);
                    idx += 2;
                    continue;
                }
                if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    copy_span(&mut out, bytes, idx, 2);
                    idx += 2;
                    continue;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && closes_dollar_quote(bytes, idx, tag) {
                    let len = tag.len() + 2;
                    copy_span(&mut out, bytes, idx, len);
                    state = State::Normal;
                    idx += len;
                    continue;
                }
            }
        }

        if let Some(ref mut buf) = out {
            buf.push(b);
        }
        idx += 1;
    }

    match out {
        Some(buf) => Cow::Owned(String::from_utf8_lossy(&buf).into_owned()),
        None => Cow::Borrowed(sql),
    }
}

fn copy_span(out: &mut Option<Vec<u8>>, bytes: &[u8], idx: usize, len: usize) {
    if let Some(buf) = out {
        buf.extend_from_slice(&bytes[idx..idx + len]);
    }
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Detects `$tag$` at `start` and returns the tag with the index of its
/// closing `$`. Tags are ASCII alphanumerics and underscores and may not
/// start with a digit, which keeps `$1` parameters out of quote detection.
fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }
    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn closes_dollar_quote(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    bytes.get(idx + 1..end) == Some(tag.as_bytes()) && bytes.get(end) == Some(&b'$')
}

/// Renders an array value as a PostgreSQL literal, `{'a','b'}` style.
/// Text elements are single-quoted, nested arrays recurse.
pub(crate) fn array_literal(items: &[SqlValue]) -> String {
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            SqlValue::Text(s) => {
                let _ = write!(out, "'{s}'");
            }
            SqlValue::Int(v) => {
                let _ = write!(out, "{v}");
            }
            SqlValue::Float(v) => {
                let _ = write!(out, "{v}");
            }
            SqlValue::Bool(b) => out.push_str(if *b { "t" } else { "f" }),
            SqlValue::Timestamp(ts) => {
                let _ = write!(out, "'{}'", ts.format(TIMESTAMP_FORMAT));
            }
            SqlValue::Array(nested) => out.push_str(&array_literal(nested)),
            SqlValue::Null => out.push_str("NULL"),
            other => {
                let _ = write!(out, "'{}'", other.to_json_value());
            }
        }
    }
    out.push('}');
    out
}

/// Renders a key/value map as an hstore literal, `"k"=>"v"` pairs joined
/// by commas. Double quotes inside values are backslash-escaped.
pub(crate) fn hstore_literal(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "\"{key}\"=>\"{}\"", value.replace('"', "\\\""));
    }
    out
}

fn braces_to_json(src: &str) -> String {
    src.replace('{', "[").replace('}', "]").replace('\'', "\"")
}

/// Decodes an array literal by substituting it into JSON syntax.
pub(crate) fn parse_array<T: serde::de::DeserializeOwned>(
    src: &str,
) -> Result<Vec<T>, DbError> {
    if src.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&braces_to_json(src))
        .map_err(|e| DbError::Conversion(format!("json parse error: {e} src={src}")))
}

/// Like [`parse_array`], with `NaN` elements decoded as zero.
pub(crate) fn parse_number_array<T: serde::de::DeserializeOwned>(
    src: &str,
) -> Result<Vec<T>, DbError> {
    if src.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&braces_to_json(src).replace("NaN", "0"))
        .map_err(|e| DbError::Conversion(format!("json parse error: {e} src={src}")))
}

/// Decodes an hstore literal into a map.
pub(crate) fn parse_hstore(src: &str) -> Result<BTreeMap<String, String>, DbError> {
    if src.is_empty() {
        return Ok(BTreeMap::new());
    }
    let json = format!("{{{}}}", src.replace("\"=>\"", "\":\""));
    serde_json::from_str(&json)
        .map_err(|e| DbError::Conversion(format!("json parse error: {e} src={src}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_markers_and_honors_the_escape() {
        let res = adapt_placeholders("select ?, $?, ?");
        assert_eq!(res, "select $1, ?, $2");
    }

    #[test]
    fn skips_literals_and_comments() {
        let sql = "select '?', \"col?\" -- ?\n/* ? */ from t where a = ?";
        let res = adapt_placeholders(sql);
        assert_eq!(res, "select '?', \"col?\" -- ?\n/* ? */ from t where a = $1");
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "select ? where b = $fn$ ? $fn$ and c = ?";
        let res = adapt_placeholders(sql);
        assert_eq!(res, "select $1 where b = $fn$ ? $fn$ and c = $2");
    }

    #[test]
    fn handles_doubled_quotes_inside_literals() {
        let sql = "select 'it''s ?', ? from t";
        let res = adapt_placeholders(sql);
        assert_eq!(res, "select 'it''s ?', $1 from t");
    }

    #[test]
    fn existing_numbered_markers_pass_through() {
        let sql = "update t set a=$2 where id=$1";
        let res = adapt_placeholders(sql);
        assert!(matches!(res, Cow::Borrowed(_)));
        assert_eq!(res, sql);
    }

    #[test]
    fn borrowed_when_nothing_to_rewrite() {
        let res = adapt_placeholders("select 1");
        assert!(matches!(res, Cow::Borrowed(_)));
    }

    #[test]
    fn multibyte_text_survives_rewriting() {
        let res = adapt_placeholders("select 'héllo', ? -- ü\n");
        assert_eq!(res, "select 'héllo', $1 -- ü\n");
    }

    #[test]
    fn array_literals_quote_strings_and_keep_numbers_bare() {
        let items = vec![
            SqlValue::Text("a".to_string()),
            SqlValue::Int(2),
            SqlValue::Null,
            SqlValue::Bool(true),
        ];
        assert_eq!(array_literal(&items), "{'a',2,NULL,t}");
        assert_eq!(array_literal(&[]), "{}");
    }

    #[test]
    fn arrays_parse_back_from_literals() {
        let strings: Vec<String> = parse_array("{'a','b'}").unwrap();
        assert_eq!(strings, ["a", "b"]);
        let ints: Vec<i64> = parse_number_array("{1,NaN,3}").unwrap();
        assert_eq!(ints, [1, 0, 3]);
        let empty: Vec<i64> = parse_number_array("").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn malformed_array_literals_error() {
        let res: Result<Vec<String>, _> = parse_array("{a,b}");
        assert!(matches!(res, Err(DbError::Conversion(_))));
    }

    #[test]
    fn hstore_round_trips_with_escaped_quotes() {
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), "plain".to_string());
        map.insert("q".to_string(), "say \"hi\"".to_string());

        let literal = hstore_literal(&map);
        assert_eq!(literal, "\"k\"=>\"plain\",\"q\"=>\"say \\\"hi\\\"\"");
        assert_eq!(parse_hstore(&literal).unwrap(), map);
        assert!(parse_hstore("").unwrap().is_empty());
    }

    #[test]
    fn connect_string_applies_defaults() {
        let driver = PostgresDriver {
            dbname: "app".to_string(),
            user: "svc".to_string(),
            password: "pw".to_string(),
            ..PostgresDriver::default()
        };
        assert_eq!(
            driver.connect_string(),
            "dbname=app user=svc password=pw host=127.0.0.1 port=5432 sslmode=disable"
        );
    }

    #[test]
    fn connect_string_prefers_hostaddr_then_override() {
        let mut driver = PostgresDriver {
            dbname: "app".to_string(),
            user: "svc".to_string(),
            password: "pw".to_string(),
            hostaddr: "10.0.0.9".to_string(),
            ..PostgresDriver::default()
        };
        assert_eq!(
            driver.connect_string(),
            "dbname=app user=svc password=pw hostaddr=10.0.0.9 sslmode=disable"
        );

        driver.connect = Some("dbname=x user=y".to_string());
        assert_eq!(driver.connect_string(), "dbname=x user=y");
    }
}

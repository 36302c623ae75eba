//! Cypher statement construction for the Apache AGE bridge.
//!
//! AGE 1.6 does not accept driver-level parameters through the `cypher()`
//! function, so parameters are embedded into the query text as escaped
//! literals, and the whole body is then escaped for the outer dollar-quoted
//! string. Everything here is pure string work; execution lives in `store`.

use std::collections::BTreeMap;

use regex::Regex;

/// A parameter value embeddable into a Cypher query.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Option<String>> for ParamValue {
    fn from(v: Option<String>) -> Self {
        v.map(Self::Str).unwrap_or(Self::Null)
    }
}

/// Named parameters for one query.
pub type Params = BTreeMap<String, ParamValue>;

/// Build a one-entry parameter map.
pub fn params<I, K, V>(entries: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Escape a string for use inside a single-quoted Cypher literal.
/// Backslashes are doubled first so later escapes are not double-escaped.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Format one parameter value as a Cypher literal.
fn format_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Null => "null".to_string(),
        ParamValue::Str(s) => format!("'{}'", escape_string(s)),
        ParamValue::Int(n) => n.to_string(),
        ParamValue::Float(f) => f.to_string(),
        ParamValue::Bool(b) => b.to_string(),
    }
}

/// Replace `$name` placeholders with escaped literal values.
///
/// A placeholder only matches when not immediately followed by another
/// identifier character, so `$code` never clobbers `$codeSystem`.
pub fn embed_parameters(query: &str, params: &Params) -> String {
    let mut result = query.to_string();
    for (name, value) in params {
        let pattern = format!(r"\${}($|[^A-Za-z0-9_])", regex::escape(name));
        let re = Regex::new(&pattern).expect("parameter pattern must compile");
        let literal = format_value(value);
        result = re
            .replace_all(&result, |caps: &regex::Captures<'_>| {
                format!("{}{}", literal, &caps[1])
            })
            .into_owned();
    }
    result
}

/// Escape an embedded query body for the outer dollar-quoted SQL string.
/// Backslashes are doubled first, then `$` is escaped so the body cannot
/// terminate the dollar quoting early.
pub fn escape_dollar_quoted(query: &str) -> String {
    query.replace('\\', "\\\\").replace('$', "\\$")
}

/// A graph write is anything containing CREATE or MERGE.
pub fn is_mutation(query: &str) -> bool {
    let upper = query.to_ascii_uppercase();
    upper.contains("CREATE") || upper.contains("MERGE")
}

/// Count commas in a RETURN clause that sit outside parentheses, brackets,
/// and quoted string literals (with escaped-quote awareness). Determines the
/// agtype output column count.
pub fn count_top_level_commas(return_clause: &str) -> usize {
    let mut count = 0;
    let mut paren_depth: i32 = 0;
    let mut bracket_depth: i32 = 0;
    let mut in_string = false;
    let mut delimiter = '\0';
    let mut prev = '\0';

    for c in return_clause.chars() {
        if !in_string && (c == '\'' || c == '"') {
            in_string = true;
            delimiter = c;
        } else if in_string && c == delimiter && prev != '\\' {
            in_string = false;
        }

        if !in_string && paren_depth == 0 && bracket_depth == 0 && c == ',' {
            count += 1;
        }

        if !in_string {
            match c {
                '(' => paren_depth += 1,
                ')' => paren_depth -= 1,
                '[' => bracket_depth += 1,
                ']' => bracket_depth -= 1,
                _ => {}
            }
        }

        prev = c;
    }

    count
}

/// A fully-assembled SQL statement for the AGE bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableStatement {
    pub sql: String,
    pub column_count: usize,
    pub mutation: bool,
}

/// Assemble the bridge SQL for an already-embedded, dollar-quote-escaped
/// query body.
///
/// Mutations without a RETURN get a trivial `RETURN 'success'` appended so
/// the column definition list always matches. Otherwise the column count is
/// derived from the top-level commas after RETURN: one column is aliased
/// `c`, N columns are aliased `c0..c(N-1)`, all typed agtype.
pub fn build_statement(graph_name: &str, escaped_query: &str) -> ExecutableStatement {
    // ASCII uppercasing preserves byte offsets, so indices found here are
    // valid into the original query text.
    let upper = escaped_query.to_ascii_uppercase();
    let mutation = is_mutation(&upper);
    let return_idx = upper.find("RETURN");

    if mutation && return_idx.is_none() {
        let body = format!("{escaped_query} RETURN 'success'");
        return ExecutableStatement {
            sql: cypher_call(graph_name, &body, 1),
            column_count: 1,
            mutation,
        };
    }

    if let Some(idx) = return_idx {
        let after = escaped_query[idx + "RETURN".len()..].trim();
        let commas = count_top_level_commas(after);
        if commas > 0 {
            let columns = commas + 1;
            return ExecutableStatement {
                sql: cypher_call(graph_name, escaped_query, columns),
                column_count: columns,
                mutation,
            };
        }
    }

    ExecutableStatement {
        sql: cypher_call(graph_name, escaped_query, 1),
        column_count: 1,
        mutation,
    }
}

fn cypher_call(graph_name: &str, body: &str, columns: usize) -> String {
    let column_defs = if columns <= 1 {
        "c agtype".to_string()
    } else {
        (0..columns)
            .map(|i| format!("c{i} agtype"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "SELECT * FROM ag_catalog.cypher('{graph_name}'::name, $q${body}$q$) AS t({column_defs})"
    )
}

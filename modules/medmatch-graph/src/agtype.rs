//! Parsing of agtype values returned as text by the AGE bridge.
//!
//! Vertex and edge values carry `::vertex` / `::edge` type suffixes that are
//! stripped before structural parsing. Structural parsing is flat: one level
//! of `key: value` pairs, split on commas outside nested structures and
//! quoted strings. Nested objects and arrays inside a vertex's properties
//! stay opaque raw strings; callers needing structure re-parse them.

use std::collections::BTreeMap;

/// A flat scalar inside a parsed vertex/edge/map.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Scalar {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::Str(s) => s.parse().ok(),
            Scalar::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Scalar::Str(s) => s.clone(),
            Scalar::Int(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// One classified agtype value.
#[derive(Debug, Clone, PartialEq)]
pub enum AgValue {
    Vertex(BTreeMap<String, Scalar>),
    Edge(BTreeMap<String, Scalar>),
    Integer(i64),
    Bool(bool),
    Map(BTreeMap<String, Scalar>),
    Str(String),
}

impl AgValue {
    /// Classify one raw agtype text value.
    ///
    /// Recognized in priority order: vertex suffix, edge suffix, bare
    /// integer, brace-delimited object, `relationshipCount:` pattern,
    /// `count(*)` pattern, then boolean/integer/string fallback.
    pub fn classify(raw: &str) -> AgValue {
        let s = raw.trim();

        if s.contains("::vertex") {
            let stripped = s.replace("::vertex", "");
            let stripped = stripped.trim();
            if stripped.starts_with('{') && stripped.ends_with('}') {
                return AgValue::Vertex(parse_flat_object(stripped));
            }
            return AgValue::Str(stripped.to_string());
        }

        if s.contains("::edge") {
            let stripped = s.replace("::edge", "");
            let stripped = stripped.trim();
            if stripped.starts_with('{') && stripped.ends_with('}') {
                return AgValue::Edge(parse_flat_object(stripped));
            }
            return AgValue::Str(stripped.to_string());
        }

        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            return AgValue::Integer(s.parse().unwrap_or(0));
        }

        if s.starts_with('{') && s.ends_with('}') {
            return AgValue::Map(parse_flat_object(s));
        }

        if s.contains("relationshipCount:") || s.contains("count(*)") {
            return AgValue::Integer(parse_after_colon(s));
        }

        if s.eq_ignore_ascii_case("true") {
            return AgValue::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return AgValue::Bool(false);
        }
        if let Ok(n) = s.parse::<i64>() {
            return AgValue::Integer(n);
        }
        AgValue::Str(strip_quotes(s).to_string())
    }

    /// Integer view: direct for Integer, parsed for numeric strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AgValue::Integer(n) => Some(*n),
            AgValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a field inside a vertex/edge/map value.
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        match self {
            AgValue::Vertex(m) | AgValue::Edge(m) | AgValue::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Flat string rendering, used when extracting a named field across rows.
    pub fn render(&self) -> String {
        match self {
            AgValue::Str(s) => s.clone(),
            AgValue::Integer(n) => n.to_string(),
            AgValue::Bool(b) => b.to_string(),
            AgValue::Vertex(m) | AgValue::Edge(m) | AgValue::Map(m) => {
                let pairs: Vec<String> =
                    m.iter().map(|(k, v)| format!("{k}: {}", v.render())).collect();
                format!("{{{}}}", pairs.join(", "))
            }
        }
    }
}

/// Parse `{key: value, ...}` one level deep. Values that are themselves
/// objects or arrays are kept as raw strings.
fn parse_flat_object(s: &str) -> BTreeMap<String, Scalar> {
    let content = &s[1..s.len() - 1];
    let mut map = BTreeMap::new();

    for pair in split_top_level(content) {
        let Some((key, value)) = pair.split_once(':') else {
            continue;
        };
        let key = strip_quotes(key.trim()).to_string();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        if value.starts_with('{') || value.starts_with('[') {
            // Opaque nested value; callers re-parse if they need structure.
            map.insert(key, Scalar::Str(value.to_string()));
            continue;
        }
        map.insert(key, coerce_scalar(strip_quotes(value)));
    }

    map
}

/// Split on commas outside braces, brackets, parens, and quoted strings.
fn split_top_level(content: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut delimiter = '\0';
    let mut prev = '\0';
    let mut start = 0;

    for (i, c) in content.char_indices() {
        if !in_string && (c == '\'' || c == '"') {
            in_string = true;
            delimiter = c;
        } else if in_string && c == delimiter && prev != '\\' {
            in_string = false;
        }

        if !in_string {
            match c {
                '{' | '[' | '(' => depth += 1,
                '}' | ']' | ')' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&content[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }

        prev = c;
    }

    if start < content.len() {
        parts.push(&content[start..]);
    }
    parts
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Best-effort coercion: boolean, then integer, else string.
fn coerce_scalar(value: &str) -> Scalar {
    if value.eq_ignore_ascii_case("true") {
        return Scalar::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Scalar::Bool(false);
    }
    if let Ok(n) = value.parse::<i64>() {
        return Scalar::Int(n);
    }
    Scalar::Str(value.to_string())
}

fn parse_after_colon(s: &str) -> i64 {
    s.split(':')
        .nth(1)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

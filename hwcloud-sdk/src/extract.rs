//! Response extraction
//!
//! `path_search` evaluates a small JMESPath subset against a JSON document:
//!
//! - `a.b.c` member access
//! - `items[0]`, `items[-1]` indexing
//! - `items[*].id` projection
//! - `items[?status=='ACTIVE'].id` filter projection (`==`, `!=`)
//! - `expr | expr` pipe, which ends a projection
//!
//! Missing members evaluate to null, and a null result is reported as `None`.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::http_client::HttpUtils;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Index(i64),
    Wildcard,
    Filter {
        key: String,
        negate: bool,
        literal: Value,
    },
}

fn split_top_level(expr: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '`') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&expr[start..]);
    parts
}

fn parse_literal(raw: &str) -> std::result::Result<Value, String> {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return Ok(Value::String(inner.to_string()));
    }
    let json = raw
        .strip_prefix('`')
        .and_then(|r| r.strip_suffix('`'))
        .unwrap_or(raw);
    serde_json::from_str(json).map_err(|e| format!("invalid literal {raw}: {e}"))
}

fn parse_bracket(inner: &str) -> std::result::Result<Token, String> {
    let inner = inner.trim();
    if inner == "*" {
        return Ok(Token::Wildcard);
    }
    if let Some(cond) = inner.strip_prefix('?') {
        let (key, literal, negate) = if let Some((k, l)) = cond.split_once("!=") {
            (k, l, true)
        } else if let Some((k, l)) = cond.split_once("==") {
            (k, l, false)
        } else {
            return Err(format!("unsupported filter: {cond}"));
        };
        return Ok(Token::Filter {
            key: key.trim().to_string(),
            negate,
            literal: parse_literal(literal)?,
        });
    }
    inner
        .parse::<i64>()
        .map(Token::Index)
        .map_err(|_| format!("invalid index: {inner}"))
}

fn tokenize(expr: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.trim().chars().collect();
    let mut i = 0;
    let mut field = String::new();

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if !field.is_empty() {
                    tokens.push(Token::Field(std::mem::take(&mut field)));
                }
                i += 1;
            }
            '[' => {
                if !field.is_empty() {
                    tokens.push(Token::Field(std::mem::take(&mut field)));
                }
                let mut j = i + 1;
                let mut quote: Option<char> = None;
                while j < chars.len() {
                    match (quote, chars[j]) {
                        (Some(q), c) if c == q => quote = None,
                        (None, c @ ('\'' | '`')) => quote = Some(c),
                        (None, ']') => break,
                        _ => {}
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(format!("unclosed bracket in {expr}"));
                }
                let inner: String = chars[i + 1..j].iter().collect();
                tokens.push(parse_bracket(&inner)?);
                i = j + 1;
            }
            c if c.is_whitespace() => i += 1,
            c => {
                field.push(c);
                i += 1;
            }
        }
    }
    if !field.is_empty() {
        tokens.push(Token::Field(field));
    }
    Ok(tokens)
}

fn eval(tokens: &[Token], value: &Value) -> Value {
    let Some((first, rest)) = tokens.split_first() else {
        return value.clone();
    };
    match first {
        Token::Field(name) => match value.get(name) {
            Some(v) => eval(rest, v),
            None => Value::Null,
        },
        Token::Index(idx) => {
            let Some(items) = value.as_array() else {
                return Value::Null;
            };
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let pos = if *idx < 0 { len + idx } else { *idx };
            usize::try_from(pos)
                .ok()
                .and_then(|p| items.get(p))
                .map_or(Value::Null, |v| eval(rest, v))
        }
        Token::Wildcard => project(value, |_| true, rest),
        Token::Filter {
            key,
            negate,
            literal,
        } => {
            let key_tokens: Vec<Token> = key
                .split('.')
                .map(|k| Token::Field(k.to_string()))
                .collect();
            project(
                value,
                |item| (eval(&key_tokens, item) == *literal) != *negate,
                rest,
            )
        }
    }
}

fn project(value: &Value, keep: impl Fn(&Value) -> bool, rest: &[Token]) -> Value {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(object) => object.values().collect(),
        _ => return Value::Null,
    };
    Value::Array(
        items
            .into_iter()
            .filter(|item| keep(item))
            .map(|item| eval(rest, item))
            .filter(|v| !v.is_null())
            .collect(),
    )
}

/// Evaluate `expr` against `value`. Invalid expressions and null results are `None`.
pub fn path_search(expr: &str, value: &Value) -> Option<Value> {
    let mut current = value.clone();
    for stage in split_top_level(expr, '|') {
        match tokenize(stage) {
            Ok(tokens) => current = eval(&tokens, &current),
            Err(e) => {
                log::warn!("Invalid search expression {expr:?}: {e}");
                return None;
            }
        }
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// [`path_search`] with a fallback for missing values.
pub fn path_search_or(expr: &str, value: &Value, default: Value) -> Value {
    path_search(expr, value).unwrap_or(default)
}

/// String result of [`path_search`]. Non-string results are `None`.
pub fn path_search_str(expr: &str, value: &Value) -> Option<String> {
    match path_search(expr, value)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Array result of [`path_search`]; anything else is an empty list.
pub fn path_search_list(expr: &str, value: &Value) -> Vec<Value> {
    match path_search(expr, value) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Parse a response body. An empty body is an empty object.
pub fn flatten_response(service: &str, body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    HttpUtils::parse_json(body, service)
}

/// Build one object per item, taking each `(key, expr)` from the item via [`path_search`].
/// Missing values become null.
pub fn flatten_objects(items: &[Value], mapping: &[(&str, &str)]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            Value::Object(
                mapping
                    .iter()
                    .map(|(key, expr)| {
                        (
                            (*key).to_string(),
                            path_search_or(expr, item, Value::Null),
                        )
                    })
                    .collect(),
            )
        })
        .collect()
}

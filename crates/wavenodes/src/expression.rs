//! Restricted expression language for condition nodes.
//!
//! Sources use Python-flavoured operators and are rewritten into a rhai
//! expression before evaluation:
//!
//! ```text
//! start['val'] > 0 and llm.text != ''
//! classifier.category_id in ['billing', 'refund']
//! not (api.status_code >= 400)
//! ```
//!
//! The rhai engine is built raw: no standard packages, no `eval`, no
//! printing, and `compile_expression` refuses statements, assignments and
//! blocks. Only the context's variables and a `contains` overload set for
//! `in` are visible to a script.

use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Array, Dynamic, Engine, ImmutableString, ParseErrorType, Scope};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MAX_EXPRESSION_LEN: usize = 4096;
pub const MAX_DEPTH: usize = 64;
pub const MAX_OPERATORS: usize = 64;
pub const MAX_OPERATIONS: u64 = 10_000;

const DISABLED_SYMBOLS: [&str; 6] = ["eval", "print", "debug", "Fn", "call", "curry"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("expression is too long ({0} characters, limit {})", MAX_EXPRESSION_LEN)]
    TooLong(usize),

    #[error("expression has more than {} operators or nests too deeply", MAX_OPERATORS)]
    TooComplex,

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("evaluation failed: {0}")]
    Eval(String),
}

/// Parses and evaluates `source` against `names`.
pub fn evaluate(source: &str, names: &Map<String, Value>) -> Result<Value, ExpressionError> {
    let length = source.chars().count();
    if length > MAX_EXPRESSION_LEN {
        return Err(ExpressionError::TooLong(length));
    }
    let script = translate(source)?;

    let engine = restricted_engine();
    let ast = engine.compile_expression(&script).map_err(|e| match e.err_type() {
        ParseErrorType::ExprTooDeep => ExpressionError::TooComplex,
        _ => ExpressionError::Syntax(e.to_string()),
    })?;

    let mut scope = Scope::new();
    for (name, value) in names {
        let value = to_dynamic(value).map_err(|e| ExpressionError::Eval(e.to_string()))?;
        scope.push_dynamic(name.as_str(), value);
    }

    let result = engine
        .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
        .map_err(|e| ExpressionError::Eval(e.to_string()))?;
    from_dynamic::<Value>(&result).map_err(|e| ExpressionError::Eval(e.to_string()))
}

/// Python-style truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn restricted_engine() -> Engine {
    let mut engine = Engine::new_raw();
    engine
        .set_max_expr_depths(MAX_DEPTH, MAX_DEPTH)
        .set_max_operations(MAX_OPERATIONS)
        .set_fail_on_invalid_map_property(true);
    for symbol in DISABLED_SYMBOLS {
        engine.disable_symbol(symbol);
    }

    // Backs the `in` and `!in` operators.
    engine
        .register_fn("contains", |items: &mut Array, item: Dynamic| {
            items.iter().any(|candidate| same_value(candidate, &item))
        })
        .register_fn("contains", |map: &mut rhai::Map, key: ImmutableString| {
            map.contains_key(key.as_str())
        })
        .register_fn("contains", |text: &mut ImmutableString, part: ImmutableString| {
            text.contains(part.as_str())
        });
    engine
}

fn same_value(a: &Dynamic, b: &Dynamic) -> bool {
    match (as_float(a), as_float(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.type_name() == b.type_name() && a.to_string() == b.to_string(),
    }
}

fn as_float(value: &Dynamic) -> Option<f64> {
    value
        .as_int()
        .map(|i| i as f64)
        .ok()
        .or_else(|| value.as_float().ok())
}

/// Rewrites Python-style keywords and quoting into rhai syntax.
///
/// `not` wraps its operand in parentheses that close at the next `and`/`or`,
/// closing bracket or comma on the same bracket level, so it binds looser than
/// comparisons.
fn translate(source: &str) -> Result<String, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 16);
    let mut operators = 0;
    let mut depth = 0usize;
    let mut negations: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if operators > MAX_OPERATORS {
            return Err(ExpressionError::TooComplex);
        }
        let c = chars[i];

        if c == '\'' || c == '"' {
            i = string_literal(&chars, i, &mut out)?;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric()
                    || chars[i] == '_'
                    || (chars[i] == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)))
            {
                i += 1;
            }
            out.extend(&chars[start..i]);
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let (word, end) = word_at(&chars, i);
            i = end;
            match word.as_str() {
                "and" | "or" => {
                    operators += 1;
                    close_negations(&mut out, &mut negations, depth);
                    out.push_str(if word == "and" { " && " } else { " || " });
                }
                "not" => {
                    operators += 1;
                    let next = skip_whitespace(&chars, i);
                    match word_at(&chars, next) {
                        (following, end) if following == "in" => {
                            out.push_str(" !in ");
                            i = end;
                        }
                        _ => {
                            out.push_str("!(");
                            negations.push(depth);
                        }
                    }
                }
                "in" => {
                    operators += 1;
                    out.push_str(" in ");
                }
                "True" => out.push_str("true"),
                "False" => out.push_str("false"),
                "None" | "null" => out.push_str("()"),
                _ => out.push_str(&word),
            }
            continue;
        }

        match c {
            '(' | '[' => {
                operators += 1;
                depth += 1;
                out.push(c);
            }
            ')' | ']' | ',' => {
                close_negations(&mut out, &mut negations, depth);
                if c != ',' {
                    depth = depth.saturating_sub(1);
                }
                out.push(c);
            }
            '+' | '-' | '*' | '/' | '%' | '<' | '>' | '=' | '!' | '&' | '.' => {
                operators += 1;
                out.push(c);
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                operators += 1;
                out.push_str("||");
                i += 1;
            }
            c if c.is_whitespace() => out.push(c),
            _ => {
                return Err(ExpressionError::Syntax(format!(
                    "unexpected character '{}' at position {}",
                    c, i
                )))
            }
        }
        i += 1;
    }

    if operators > MAX_OPERATORS {
        return Err(ExpressionError::TooComplex);
    }
    for _ in negations.drain(..) {
        out.push(')');
    }
    Ok(out)
}

fn close_negations(out: &mut String, negations: &mut Vec<usize>, depth: usize) {
    while negations.last() == Some(&depth) {
        negations.pop();
        out.push(')');
    }
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn word_at(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

/// Copies a single- or double-quoted literal as a rhai string and returns the index after it.
fn string_literal(chars: &[char], start: usize, out: &mut String) -> Result<usize, ExpressionError> {
    let quote = chars[start];
    let unterminated =
        || ExpressionError::Syntax(format!("unterminated string literal at position {}", start));
    let mut i = start + 1;
    out.push('"');
    loop {
        let &ch = chars.get(i).ok_or_else(unterminated)?;
        i += 1;
        let literal = match ch {
            ch if ch == quote => break,
            '\\' => {
                let &escaped = chars.get(i).ok_or_else(unterminated)?;
                i += 1;
                match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                }
            }
            other => other,
        };
        match literal {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    Ok(i)
}

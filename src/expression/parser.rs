//! Expression parsing
//!
//! Grammar:
//!
//! ```text
//! expr    := FUNC '(' args? ')' | literal | path
//! args    := expr (',' expr)*
//! literal := '...' | "..."
//! path    := ident ('.' ident | '[' int ']')*
//! ```
//!
//! A bare path at the top level is read as `NOOP(path)`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ExpressionError;

static FUNCTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("function name regex"));

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Function call; `name` is stored uppercased
    Call { name: String, args: Vec<Expression> },
    /// Quoted string literal, quotes removed
    Literal(String),
    /// Field reference into the record
    Path(FieldPath),
}

/// One step of a field path
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Key(String),
    /// Negative indices count from the end
    Index(i64),
}

/// Dotted/indexed reference such as `offers[0].price`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath {
    pub segments: Vec<PathSegment>,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ExpressionError::Empty);
        }
        if is_quoted(source) {
            return Ok(Expression::Literal(source[1..source.len() - 1].to_string()));
        }
        if source.contains('(') {
            return parse_call(source);
        }
        Ok(Expression::Call {
            name: "NOOP".to_string(),
            args: vec![Expression::Path(FieldPath::parse(source)?)],
        })
    }
}

impl FieldPath {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let source = source.trim();
        let mut segments = Vec::new();
        let mut rest = source;
        let mut expect_key = true;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let end = after
                    .find(']')
                    .ok_or_else(|| ExpressionError::syntax(source, "unclosed '['"))?;
                let index = after[..end]
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ExpressionError::syntax(source, "array index must be an integer"))?;
                segments.push(PathSegment::Index(index));
                rest = &after[end + 1..];
                expect_key = false;
            } else if let Some(after) = rest.strip_prefix('.') {
                if expect_key {
                    return Err(ExpressionError::syntax(source, "empty path segment"));
                }
                rest = after;
                expect_key = true;
                if rest.is_empty() {
                    return Err(ExpressionError::syntax(source, "path ends with '.'"));
                }
            } else {
                if !expect_key {
                    return Err(ExpressionError::syntax(source, "expected '.' or '['"));
                }
                let end = rest.find(|c| c == '.' || c == '[').unwrap_or(rest.len());
                let key = &rest[..end];
                if key.contains(|c| matches!(c, ']' | '(' | ')' | ',' | '\'' | '"')) {
                    return Err(ExpressionError::syntax(source, "invalid character in path"));
                }
                segments.push(PathSegment::Key(key.to_string()));
                rest = &rest[end..];
                expect_key = false;
            }
        }

        if segments.is_empty() {
            return Err(ExpressionError::syntax(source, "empty path"));
        }
        Ok(FieldPath { segments })
    }
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')))
        && !s[1..s.len() - 1].contains(s.as_bytes()[0] as char)
}

fn parse_call(source: &str) -> Result<Expression, ExpressionError> {
    let open = source
        .find('(')
        .ok_or_else(|| ExpressionError::syntax(source, "expected '('"))?;
    let name = source[..open].trim();
    if !FUNCTION_NAME_RE.is_match(name) {
        return Err(ExpressionError::syntax(source, format!("invalid function name '{}'", name)));
    }

    let close = matching_paren(source, open)?;
    if !source[close + 1..].trim().is_empty() {
        return Err(ExpressionError::syntax(source, "unexpected input after ')'"));
    }

    let inner = &source[open + 1..close];
    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_args(source, inner)?
            .into_iter()
            .map(|arg| parse_arg(source, arg))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Expression::Call {
        name: name.to_ascii_uppercase(),
        args,
    })
}

fn parse_arg(source: &str, arg: &str) -> Result<Expression, ExpressionError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(ExpressionError::syntax(source, "empty argument"));
    }
    if is_quoted(arg) {
        Ok(Expression::Literal(arg[1..arg.len() - 1].to_string()))
    } else if arg.contains('(') {
        parse_call(arg)
    } else {
        Ok(Expression::Path(FieldPath::parse(arg)?))
    }
}

/// Index of the `)` closing the `(` at `open`, skipping quoted text.
fn matching_paren(source: &str, open: usize) -> Result<usize, ExpressionError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in source.char_indices().skip_while(|(i, _)| *i < open) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(ExpressionError::syntax(source, "unbalanced parentheses"))
}

/// Split on commas outside parentheses and quotes.
fn split_args<'a>(source: &str, inner: &'a str) -> Result<Vec<&'a str>, ExpressionError> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth < 0 {
                    return Err(ExpressionError::syntax(source, "unbalanced parentheses"));
                }
            }
            (None, ',') if depth == 0 => {
                args.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(ExpressionError::syntax(source, "unterminated string literal"));
    }
    args.push(&inner[start..]);
    Ok(args)
}

//! Tokenizer and condition parser.

use crate::error::QueryError;

/// One parsed predicate, ANDed with its siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Dot-addressed field; `None` for bare full-text terms.
    pub field: Option<String>,
    pub op: Operator,
    /// A leading `-` negates the whole condition (`not_exists` is
    /// `Exists` negated).
    pub negate: bool,
}

/// Comparison operator plus its right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Exact match, case-sensitive.
    Eq(String),
    Gt(String),
    Gte(String),
    Lt(String),
    Lte(String),
    /// Logical OR of exact matches (`field:a,b`).
    OneOf(Vec<String>),
    /// Field presence (`field:*`); absence via `negate`.
    Exists,
    /// Wildcard text forms, case-insensitive.
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

/// Parse a raw search expression into an ordered condition list.
pub fn parse(raw: &str) -> Result<Vec<Condition>, QueryError> {
    let mut conditions = Vec::new();
    for token in tokenize(raw)? {
        conditions.push(parse_token(&token)?);
    }
    Ok(conditions)
}

/// Split on whitespace, honoring double quotes anywhere in a token.
fn tokenize(raw: &str) -> Result<Vec<String>, QueryError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in raw.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(QueryError::UnterminatedQuote);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_token(token: &str) -> Result<Condition, QueryError> {
    let (negate, rest) = match token.strip_prefix('-') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, token),
    };

    match rest.split_once(':') {
        Some((field, value)) => {
            if field.is_empty() {
                return Err(QueryError::EmptyField {
                    token: token.to_string(),
                });
            }
            if !is_field_path(field) {
                return Err(QueryError::InvalidField {
                    field: field.to_string(),
                });
            }
            let op = parse_value(token, value)?;
            Ok(Condition {
                field: Some(field.to_string()),
                op,
                negate,
            })
        }
        None => Ok(Condition {
            field: None,
            op: text_operator(rest),
            negate,
        }),
    }
}

fn parse_value(token: &str, value: &str) -> Result<Operator, QueryError> {
    if value.is_empty() {
        return Err(QueryError::MissingValue {
            token: token.to_string(),
        });
    }
    if value == "*" {
        return Ok(Operator::Exists);
    }

    // Two-character comparators before their one-character prefixes.
    for (prefix, build) in [
        (">=", Operator::Gte as fn(String) -> Operator),
        ("<=", Operator::Lte),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ] {
        if let Some(literal) = value.strip_prefix(prefix) {
            if literal.is_empty() {
                return Err(QueryError::MissingValue {
                    token: token.to_string(),
                });
            }
            return Ok(build(literal.to_string()));
        }
    }

    // Anything else that looks like an operator sigil is a parse error,
    // not a silent exact match.
    if value.starts_with(['=', '!', '~']) {
        return Err(QueryError::UnknownComparator {
            token: token.to_string(),
        });
    }

    if value.contains(',') {
        let alternatives: Vec<String> = value.split(',').map(str::to_string).collect();
        if alternatives.iter().any(String::is_empty) {
            return Err(QueryError::MissingValue {
                token: token.to_string(),
            });
        }
        return Ok(Operator::OneOf(alternatives));
    }

    Ok(text_operator(value))
}

/// Classify a literal by its wildcard shape.
fn text_operator(literal: &str) -> Operator {
    let starts = literal.starts_with('*');
    let ends = literal.len() > 1 && literal.ends_with('*');
    let trimmed = literal.trim_matches('*').to_string();
    match (starts, ends) {
        (true, true) => Operator::Contains(trimmed),
        (false, true) => Operator::StartsWith(trimmed),
        (true, false) => Operator::EndsWith(trimmed),
        (false, false) => Operator::Eq(literal.to_string()),
    }
}

fn is_field_path(field: &str) -> bool {
    field.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

use std::{fmt, str::FromStr};

use regex::Regex;

use crate::errors::PointcutError;

const EXECUTION_PREFIX: &str = "execution(";

/// A compiled `execution(<Class>.<method>)` expression.
///
/// Each side is a literal name in which `*` matches any sequence of characters,
/// so `execution(*.*)` matches every method of every class and
/// `execution(*.create)` matches `create` on any class, but not `createUser`.
/// Both sides are anchored.
#[derive(Debug, Clone)]
pub struct Pointcut {
    expression: String,
    class: Regex,
    method: Regex,
}

impl Pointcut {
    /// Parses and compiles an expression, failing on any grammar violation
    pub fn parse(expression: &str) -> Result<Self, PointcutError> {
        let malformed = || PointcutError::Malformed(expression.to_string());

        let inner = expression
            .trim()
            .strip_prefix(EXECUTION_PREFIX)
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;

        let (class, method) = inner.split_once('.').ok_or_else(malformed)?;
        if !is_pattern(class) || !is_pattern(method) {
            return Err(malformed());
        }

        Ok(Pointcut {
            expression: expression.trim().to_string(),
            class: compile(expression, class)?,
            method: compile(expression, method)?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the pointcut selects `method` on `class`
    pub fn matches(&self, class: &str, method: &str) -> bool {
        self.class.is_match(class) && self.method.is_match(method)
    }

    /// Whether any method of `class` could be selected
    pub fn matches_class(&self, class: &str) -> bool {
        self.class.is_match(class)
    }
}

impl FromStr for Pointcut {
    type Err = PointcutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pointcut::parse(s)
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn is_pattern(pattern: &str) -> bool {
    !pattern.is_empty()
        && pattern
            .chars()
            .all(|c| c == '*' || c == '$' || c == '_' || c.is_alphanumeric())
}

fn compile(expression: &str, pattern: &str) -> Result<Regex, PointcutError> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    Regex::new(&format!("^{body}$")).map_err(|e| PointcutError::Invalid {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

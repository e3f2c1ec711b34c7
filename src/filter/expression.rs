//! Forbid expressions: exact, regular expression and wildcard name patterns.
//!
//! A [`ForbidExpression`] is compiled once, at construction. Any problem with the pattern
//! (an unknown kind, a regular expression that does not compile, an empty pattern) is
//! reported there, so evaluating an expression against a name can never fail.

use std::{fmt, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

/// How a forbid expression is evaluated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum PatternKind {
    /// Regular expression, matching anywhere in the name
    Regex,
    /// Exact, case sensitive string equality
    ExactString,
    /// Glob where `*` matches any run of characters and `?` a single one, anchored at
    /// both ends
    Wildcard,
}

impl PatternKind {
    /// Parse a kind from its name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownPatternKind`] for anything but `Regex`,
    /// `ExactString` and `Wildcard`.
    pub fn parse(kind: &str) -> Result<Self> {
        PatternKind::from_str(kind).map_err(|_| Error::UnknownPatternKind(kind.to_string()))
    }
}

#[derive(Clone)]
enum Matcher {
    Exact(String),
    Regex(Regex),
}

/// A compiled name pattern.
///
/// # Examples
///
/// ```rust
/// use ildiff::filter::{ForbidExpression, PatternKind};
///
/// let exact = ForbidExpression::new("System.Object", PatternKind::ExactString)?;
/// let glob = ForbidExpression::new("System.*", PatternKind::Wildcard)?;
/// let regex = ForbidExpression::new(r"Internal\d+$", PatternKind::Regex)?;
///
/// assert!(exact.is_match("System.Object"));
/// assert!(!exact.is_match("System.Objects"));
/// assert!(glob.is_match("System.Threading.Thread"));
/// assert!(!glob.is_match("MySystem.Thread"));
/// assert!(regex.is_match("Bank.Internal42"));
/// # Ok::<(), ildiff::Error>(())
/// ```
#[derive(Clone)]
pub struct ForbidExpression {
    pattern: String,
    kind: PatternKind,
    matcher: Matcher,
}

impl ForbidExpression {
    /// Compile `pattern` as an expression of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for an empty pattern and
    /// [`crate::Error::InvalidPattern`] if a regex or wildcard does not compile.
    pub fn new(pattern: &str, kind: PatternKind) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "empty {kind} forbid expression"
            )));
        }

        let matcher = match kind {
            PatternKind::ExactString => Matcher::Exact(pattern.to_string()),
            PatternKind::Regex => Matcher::Regex(compile(pattern, pattern)?),
            PatternKind::Wildcard => Matcher::Regex(compile(pattern, &wildcard_to_regex(pattern))?),
        };

        Ok(ForbidExpression {
            pattern: pattern.to_string(),
            kind,
            matcher,
        })
    }

    /// Compile `pattern` with the kind named `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownPatternKind`] if `kind` names no known kind, plus
    /// everything [`ForbidExpression::new`] returns.
    pub fn parse(pattern: &str, kind: &str) -> Result<Self> {
        Self::new(pattern, PatternKind::parse(kind)?)
    }

    /// Exact string expression.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for an empty pattern.
    pub fn exact(pattern: &str) -> Result<Self> {
        Self::new(pattern, PatternKind::ExactString)
    }

    /// Regular expression.
    ///
    /// # Errors
    ///
    /// See [`ForbidExpression::new`].
    pub fn regex(pattern: &str) -> Result<Self> {
        Self::new(pattern, PatternKind::Regex)
    }

    /// Wildcard expression.
    ///
    /// # Errors
    ///
    /// See [`ForbidExpression::new`].
    pub fn wildcard(pattern: &str) -> Result<Self> {
        Self::new(pattern, PatternKind::Wildcard)
    }

    /// The pattern text as supplied.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The kind of the expression.
    #[must_use]
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Returns `true` if `name` matches the expression.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(expected) => expected == name,
            Matcher::Regex(regex) => regex.is_match(name),
        }
    }
}

impl PartialEq for ForbidExpression {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.pattern == other.pattern
    }
}

impl Eq for ForbidExpression {}

impl fmt::Debug for ForbidExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForbidExpression")
            .field("pattern", &self.pattern)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for ForbidExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.pattern)
    }
}

fn compile(pattern: &str, expression: &str) -> Result<Regex> {
    Regex::new(expression).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Translate a glob into an anchored regular expression.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut translated = String::with_capacity(pattern.len() * 2 + 2);
    translated.push('^');

    let mut buffer = [0_u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            _ => translated.push_str(&regex::escape(c.encode_utf8(&mut buffer))),
        }
    }

    translated.push('$');
    translated
}

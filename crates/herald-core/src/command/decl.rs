//! Command declaration templates
//!
//! A template is a command path followed by positional-argument declarations:
//!
//! ```text
//! echo <message:text>
//! admin/ban <user> [reason] [...extra]
//! ```
//!
//! `<x>` is required, `[x]` optional, a leading `...` makes the argument
//! variadic and a `:type` suffix names its type (default `string`).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{HeraldError, Result};

/// Type of a free-text argument that swallows the rest of the input
pub const TEXT_TYPE: &str = "text";

/// A declared positional argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentDecl {
    pub name: String,
    pub kind: String,
    pub required: bool,
    pub variadic: bool,
}

impl ArgumentDecl {
    /// Whether extra positional arguments may follow this one
    pub fn absorbs_rest(&self) -> bool {
        self.variadic || self.kind == TEXT_TYPE
    }
}

/// A parsed declaration template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// The command path, e.g. `admin/ban` or `rss.add`
    pub path: String,
    pub arguments: Vec<ArgumentDecl>,
}

fn bracket_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([^<>\[\]]*)>|\[([^<>\[\]]*)\]").ok())
        .as_ref()
}

fn invalid(declaration: &str, reason: impl Into<String>) -> HeraldError {
    HeraldError::InvalidCommandDeclaration {
        declaration: declaration.to_string(),
        reason: reason.into(),
    }
}

/// Parse a declaration template
///
/// # Errors
///
/// Returns `InvalidCommandDeclaration` when the path is empty, when text
/// outside brackets follows the path, when an argument has no name or when
/// a variadic argument is not the last one.
pub fn parse_declaration(declaration: &str) -> Result<Declaration> {
    let trimmed = declaration.trim();
    let (path, rest) = match trimmed.find(char::is_whitespace) {
        Some(index) => (&trimmed[..index], trimmed[index..].trim_start()),
        None => (trimmed, ""),
    };

    if path.is_empty() {
        return Err(invalid(declaration, "missing command name"));
    }
    if path.contains(['<', '[', '>', ']']) {
        return Err(invalid(declaration, "command name must precede arguments"));
    }

    let bracket = bracket_regex().ok_or_else(|| HeraldError::Internal {
        message: "argument pattern failed to compile".to_string(),
    })?;

    let mut arguments: Vec<ArgumentDecl> = Vec::new();
    let mut cursor = 0;
    for captures in bracket.captures_iter(rest) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if !rest[cursor..whole.start()].trim().is_empty() {
            return Err(invalid(declaration, "unexpected text between arguments"));
        }
        cursor = whole.end();

        if arguments.last().is_some_and(|arg| arg.variadic) {
            return Err(invalid(declaration, "variadic argument must be last"));
        }

        let (body, required) = match (captures.get(1), captures.get(2)) {
            (Some(body), _) => (body.as_str(), true),
            (None, Some(body)) => (body.as_str(), false),
            (None, None) => continue,
        };
        arguments.push(parse_argument(declaration, body, required)?);
    }

    if !rest[cursor..].trim().is_empty() {
        return Err(invalid(declaration, "unexpected text after arguments"));
    }

    Ok(Declaration {
        path: path.to_string(),
        arguments,
    })
}

fn parse_argument(declaration: &str, body: &str, required: bool) -> Result<ArgumentDecl> {
    let body = body.trim();
    let (variadic, body) = match body.strip_prefix("...") {
        Some(rest) => (true, rest.trim_start()),
        None => (false, body),
    };

    let (name, kind) = match body.split_once(':') {
        Some((name, kind)) => (name.trim(), kind.trim()),
        None => (body, "string"),
    };

    if name.is_empty() {
        return Err(invalid(declaration, "argument name is empty"));
    }
    if kind.is_empty() {
        return Err(invalid(declaration, format!("argument {} has an empty type", name)));
    }

    Ok(ArgumentDecl {
        name: name.to_string(),
        kind: kind.to_string(),
        required,
        variadic,
    })
}

/// Split a command path into registration segments
///
/// A new segment starts before every `/` or `.` that is not the first
/// character: `a/b.c` yields `a`, `/b`, `.c`.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (index, ch) in path.char_indices() {
        if index > start && (ch == '/' || ch == '.') {
            segments.push(&path[start..index]);
            start = index;
        }
    }
    segments.push(&path[start..]);
    segments
}

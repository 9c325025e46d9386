//! Error type shared by every compilation stage.
//!
//! Shaped after a compiler error rather than a generic "anyhow-and-forget":
//! callers that want to point at the offending operation can attach hints
//! without losing the original reason.

use std::fmt::{self, Debug, Display, Formatter};

/// The five error kinds named by the design (schema, translation,
/// composition, execution, connection). `Execution` and `Connection` wrap
/// whatever the backend / pool reported; the other three are raised
/// synchronously before any database interaction is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "PascalCase")]
pub enum ErrorKind {
    Schema,
    Translation,
    Composition,
    Execution,
    Connection,
}

#[derive(Debug, Clone)]
pub enum Reason {
    Simple(String),
    NotFound { name: String, namespace: &'static str },
    Unsupported { what: String },
    UnresolvedPath { path: String },
}

impl Display for Reason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Simple(text) => f.write_str(text),
            Reason::NotFound { name, namespace } => {
                write!(f, "{namespace} `{name}` not found")
            }
            Reason::Unsupported { what } => write!(f, "unsupported: {what}"),
            Reason::UnresolvedPath { path } => {
                write!(f, "unresolved identifier path `{path}`")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub reason: Reason,
    pub hints: Vec<String>,
    pub code: Option<&'static str>,
}

impl Error {
    pub fn new(kind: ErrorKind, reason: Reason) -> Self {
        log::debug!("{kind}: {reason}");
        Error {
            kind,
            reason,
            hints: Vec::new(),
            code: None,
        }
    }

    pub fn schema<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::Schema, Reason::Simple(reason.to_string()))
    }

    pub fn translation<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::Translation, Reason::Simple(reason.to_string()))
    }

    pub fn unresolved_path(path: impl Into<String>) -> Self {
        Error::new(ErrorKind::Translation, Reason::UnresolvedPath { path: path.into() })
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Error::new(ErrorKind::Translation, Reason::Unsupported { what: what.into() })
    }

    pub fn composition<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::Composition, Reason::Simple(reason.to_string()))
    }

    pub fn not_found(namespace: &'static str, name: impl Into<String>) -> Self {
        Error::new(ErrorKind::Schema, Reason::NotFound { name: name.into(), namespace })
    }

    pub fn execution<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::Execution, Reason::Simple(reason.to_string()))
    }

    pub fn connection<S: ToString>(reason: S) -> Self {
        Error::new(ErrorKind::Connection, Reason::Simple(reason.to_string()))
    }
}

pub trait WithErrorInfo: Sized {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self;
    fn with_code(self, code: &'static str) -> Self;
}

impl WithErrorInfo for Error {
    fn push_hint<S: Into<String>>(mut self, hint: S) -> Self {
        self.hints.push(hint.into());
        self
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}

impl<T, E: WithErrorInfo> WithErrorInfo for Result<T, E> {
    fn push_hint<S: Into<String>>(self, hint: S) -> Self {
        self.map_err(|e| e.push_hint(hint))
    }

    fn with_code(self, code: &'static str) -> Self {
        self.map_err(|e| e.with_code(code))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let code = self.code.map(|c| format!("[{c}] ")).unwrap_or_default();
        write!(f, "{code}{}: {}", self.kind, self.reason)?;
        for hint in &self.hints {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T, E = Error> = core::result::Result<T, E>;

use std::fmt;

use crate::value::Value;

/// Check arity of an intrinsic's arguments, returning `BunnyError::Arity` on mismatch.
///
/// # Forms
///
/// ```ignore
/// check_arity!(args, "fn-name", 2);        // exactly 2
/// check_arity!(args, "fn-name", 1..=3);    // 1 to 3 inclusive
/// check_arity!(args, "fn-name", 2..);      // 2 or more
/// ```
#[macro_export]
macro_rules! check_arity {
    ($args:expr, $name:expr, $exact:literal) => {
        if $args.len() < $exact {
            return Err($crate::BunnyError::arity($name, $crate::ArityKind::Few));
        }
        if $args.len() > $exact {
            return Err($crate::BunnyError::arity($name, $crate::ArityKind::Many));
        }
    };
    ($args:expr, $name:expr, $lo:literal ..= $hi:literal) => {
        if $args.len() < $lo {
            return Err($crate::BunnyError::arity($name, $crate::ArityKind::Few));
        }
        if $args.len() > $hi {
            return Err($crate::BunnyError::arity($name, $crate::ArityKind::Many));
        }
    };
    ($args:expr, $name:expr, $lo:literal ..) => {
        if $args.len() < $lo {
            return Err($crate::BunnyError::arity($name, $crate::ArityKind::Few));
        }
    };
}

/// Which side of an arity check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityKind {
    Few,
    Many,
}

impl fmt::Display for ArityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArityKind::Few => write!(f, "few"),
            ArityKind::Many => write!(f, "many"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BunnyError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unexpected end of input while reading {context}")]
    Eof { context: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Argument error: too {kind} arguments to {name}")]
    Arity { name: String, kind: ArityKind },

    #[error("Type error: expected {expected}, got {got}{}", value.as_ref().map(|v| format!(" ({v})")).unwrap_or_default())]
    Type {
        expected: String,
        got: String,
        value: Option<String>,
    },

    #[error("Name not found in environment: {0}")]
    Name(String),

    #[error("Index error: index {index} out of range for length {len}")]
    Index { index: f64, len: usize },

    #[error("Value error: {0}")]
    Value(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BunnyError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        BunnyError::Syntax(msg.into())
    }

    pub fn eof(context: impl Into<String>) -> Self {
        BunnyError::Eof {
            context: context.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        BunnyError::Decode(msg.into())
    }

    pub fn arity(name: impl Into<String>, kind: ArityKind) -> Self {
        BunnyError::Arity {
            name: name.into(),
            kind,
        }
    }

    pub fn type_error(expected: impl Into<String>, got: impl Into<String>) -> Self {
        BunnyError::Type {
            expected: expected.into(),
            got: got.into(),
            value: None,
        }
    }

    /// Type error carrying the printed form of the offending value.
    pub fn type_error_with_value(expected: impl Into<String>, value: &Value) -> Self {
        let display = value.to_string();
        let truncated = if display.chars().count() > 40 {
            let head: String = display.chars().take(39).collect();
            format!("{head}…")
        } else {
            display
        };
        BunnyError::Type {
            expected: expected.into(),
            got: value.type_name().to_string(),
            value: Some(truncated),
        }
    }

    pub fn name(symbol: impl fmt::Display) -> Self {
        BunnyError::Name(symbol.to_string())
    }

    pub fn index(index: f64, len: usize) -> Self {
        BunnyError::Index { index, len }
    }

    pub fn value(msg: impl Into<String>) -> Self {
        BunnyError::Value(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        BunnyError::Io(msg.into())
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        BunnyError::ResourceExhausted(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        BunnyError::InvalidState(msg.into())
    }

    /// True for errors that indicate a broken engine invariant rather than a
    /// problem with the program being run.
    pub fn is_internal(&self) -> bool {
        matches!(self, BunnyError::InvalidState(_))
    }
}

pub type Result<T, E = BunnyError> = std::result::Result<T, E>;

//! Fatal-error taxonomy (spec §7).
//!
//! `fail()` in the source material longjmps to the nearest `PUSH_TRAP`,
//! carrying an error value. This crate expresses that as ordinary
//! `Result<T, RuntimeError>` propagation through `?`: every evaluator
//! operation that can fail returns a `Result`, and the frame-unwinding that
//! the source did via `setjmp`/`longjmp` falls out of normal `?`
//! propagation plus the `TrapGuard` RAII type in `relic-runtime::throw`
//! that restores chunk-stack and series-pool state when a `Result::Err`
//! unwinds past it.
//!
//! Internal invariant violations (spec §7: "panic unconditionally and
//! terminate the instance") are NOT represented here — those are expressed
//! with Rust's own `panic!`, deliberately outside the `Result` type, so a
//! caller cannot accidentally catch-and-continue past a broken invariant.

use std::fmt;

/// Where in the source an error occurred, when that's known.
///
/// The scanner is an external collaborator (spec §1); this core only
/// carries position metadata through, it never computes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

/// The fatal-error taxonomy of spec §7.
///
/// `Syntax` errors originate in the scanner and are only ever carried
/// through this core (never constructed by it) on their way to becoming a
/// thrown error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Scanner-originated; this core never raises these itself.
    Syntax { message: String, pos: Option<SourcePos> },
    /// Wrong type, unbound word, out-of-range, arity mismatch, ...
    Script { message: String, pos: Option<SourcePos> },
    /// Overflow, divide-by-zero, ...
    Math { message: String },
    /// Protected series, inaccessible frame, ...
    Access { message: String },
}

impl RuntimeError {
    pub fn script(message: impl Into<String>) -> Self {
        RuntimeError::Script {
            message: message.into(),
            pos: None,
        }
    }

    pub fn script_at(message: impl Into<String>, pos: SourcePos) -> Self {
        RuntimeError::Script {
            message: message.into(),
            pos: Some(pos),
        }
    }

    pub fn math(message: impl Into<String>) -> Self {
        RuntimeError::Math {
            message: message.into(),
        }
    }

    pub fn access(message: impl Into<String>) -> Self {
        RuntimeError::Access {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RuntimeError::Syntax { message, .. }
            | RuntimeError::Script { message, .. }
            | RuntimeError::Math { message }
            | RuntimeError::Access { message } => message,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Syntax { message, pos } => {
                write!(f, "syntax error: {message}")?;
                if let Some(p) = pos {
                    write!(f, " (line {}, column {})", p.line, p.column)?;
                }
                Ok(())
            }
            RuntimeError::Script { message, pos } => {
                write!(f, "script error: {message}")?;
                if let Some(p) = pos {
                    write!(f, " (line {}, column {})", p.line, p.column)?;
                }
                Ok(())
            }
            RuntimeError::Math { message } => write!(f, "math error: {message}"),
            RuntimeError::Access { message } => write!(f, "access error: {message}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

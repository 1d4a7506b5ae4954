//! Centralised error hierarchy for the **Fern** interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) must convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter-operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! Static errors (`Lex`, `Parse`, `Resolve`) render as
//! `[line N] Error<where>: <message>`; runtime errors render as the message
//! followed by `[line N]` on its own line.  The module **does not** print
//! diagnostics itself — that is the session's job.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FernError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.  `place` is `" at end"` or `" at '<lexeme>'"`.
    #[error("[line {line}] Error{place}: {message}")]
    Parse {
        message: String,
        line: usize,
        place: String,
    },

    /// Static-analysis or resolution failure (e.g. early-binding errors).
    #[error("[line {line}] Error{place}: {message}")]
    Resolve {
        message: String,
        line: usize,
        place: String,
    },

    /// Operand kind mismatch at runtime.
    #[error("{message}\n[line {line}]")]
    Type { message: String, line: usize },

    /// Undefined variable or property.
    #[error("{message}\n[line {line}]")]
    Name { message: String, line: usize },

    /// Argument-count mismatch on a call.
    #[error("{message}\n[line {line}]")]
    Arity { message: String, line: usize },

    /// A non-callable value was invoked.
    #[error("{message}\n[line {line}]")]
    Call { message: String, line: usize },

    /// A class declaration named a non-class superclass.
    #[error("{message}\n[line {line}]")]
    Inheritance { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF-8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl FernError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        FernError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.  Positions the error at the
    /// offending token (`at end` for EOF, `at '<lexeme>'` otherwise).
    pub fn parse_at<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Parse error: line={}, at={:?}, msg={}",
            token.line, token.lexeme, message
        );

        FernError::Parse {
            message,
            line: token.line,
            place: place_of(token),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve_at<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, at={:?}, msg={}",
            token.line, token.lexeme, message
        );

        FernError::Resolve {
            message,
            line: token.line,
            place: place_of(token),
        }
    }

    /// Runtime operand-kind mismatch.
    pub fn type_error<S: Into<String>>(line: usize, msg: S) -> Self {
        FernError::Type {
            message: msg.into(),
            line,
        }
    }

    /// Runtime undefined variable/property.
    pub fn name<S: Into<String>>(line: usize, msg: S) -> Self {
        FernError::Name {
            message: msg.into(),
            line,
        }
    }

    /// Runtime argument-count mismatch.
    pub fn arity<S: Into<String>>(line: usize, msg: S) -> Self {
        FernError::Arity {
            message: msg.into(),
            line,
        }
    }

    /// Runtime invocation of a non-callable.
    pub fn call<S: Into<String>>(line: usize, msg: S) -> Self {
        FernError::Call {
            message: msg.into(),
            line,
        }
    }

    /// Runtime non-class superclass.
    pub fn inheritance<S: Into<String>>(line: usize, msg: S) -> Self {
        FernError::Inheritance {
            message: msg.into(),
            line,
        }
    }

    /// True for errors detected before execution begins (scan/parse/resolve).
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            FernError::Lex { .. } | FernError::Parse { .. } | FernError::Resolve { .. }
        )
    }
}

fn place_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, FernError>;

/// Accumulator for static errors across one scan+parse+resolve pass.
///
/// Threaded by value through the front-end phases instead of process-wide
/// error flags, so a run can report many independent errors and the session
/// decides what to do with them.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<FernError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one static error.
    pub fn report(&mut self, error: FernError) {
        info!("Diagnostic recorded: {}", error);

        self.errors.push(error);
    }

    /// Did any phase report an error so far?
    pub fn had_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All errors reported so far, in order.
    pub fn errors(&self) -> &[FernError] {
        &self.errors
    }
}

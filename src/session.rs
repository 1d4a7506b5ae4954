//! One scan→parse→resolve→interpret run, plus the state an interactive
//! session carries between submitted lines.
//!
//! Static errors accumulate in a per-run [`Diagnostics`] and gate
//! interpretation entirely; the first runtime fault halts the run.  Both are
//! printed to stderr here and summarized as a [`RunStatus`] so the driver can
//! map outcomes to exit codes.  In interactive mode the diagnostics start
//! fresh on every line, so one bad line never poisons the next.

use std::io::Write;

use log::{debug, info};

use crate::ast::{ExprId, Stmt};
use crate::error::Diagnostics;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

/// Outcome of one submitted program or line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Ran to completion.
    Ok,

    /// Syntax or resolution errors were reported; nothing executed.
    StaticError,

    /// Execution started and a runtime fault halted it.
    RuntimeError,
}

/// Interpreter state with the lifetime of one file run or one whole
/// interactive session.
pub struct Session<W: Write> {
    interpreter: Interpreter<W>,
    interactive: bool,

    /// Session arena: function/class declaration statements from earlier
    /// interactive lines.  A closure defined on line 1 keeps its body alive
    /// for a call on line 10, so these nodes must outlive the line that
    /// produced them; every other statement drops at end of line.
    retained: Vec<Stmt>,

    /// Watermark for the parser's per-node id counter.  Carried across lines
    /// so bindings recorded for retained declarations are never clobbered.
    next_expr_id: ExprId,
}

impl<W: Write> Session<W> {
    pub fn new(out: W, interactive: bool) -> Self {
        info!("Session created (interactive={})", interactive);

        Self {
            interpreter: Interpreter::with_output(out),
            interactive,
            retained: Vec::new(),
            next_expr_id: 0,
        }
    }

    /// Run one source program (file mode) or one submitted line (prompt
    /// mode) through the full pipeline.
    pub fn run(&mut self, source: &str) -> RunStatus {
        info!("Running {} byte(s) of source", source.len());

        let mut diagnostics = Diagnostics::new();

        // ── scan ────────────────────────────────────────────────────────
        let mut tokens: Vec<Token> = Vec::new();
        for result in Scanner::new(source.as_bytes()) {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => diagnostics.report(e),
            }
        }

        // ── parse ───────────────────────────────────────────────────────
        let mut parser = Parser::with_start_id(&tokens, self.next_expr_id);
        let statements = parser.parse(&mut diagnostics);
        self.next_expr_id = parser.next_expr_id();

        // ── resolve (gated on a clean parse) ────────────────────────────
        if !diagnostics.had_errors() {
            let bindings = Resolver::new().resolve(&statements, &mut diagnostics);

            if !diagnostics.had_errors() {
                self.interpreter.add_bindings(bindings);
            }
        }

        // ── interpret or report ─────────────────────────────────────────
        let status = if diagnostics.had_errors() {
            for error in diagnostics.errors() {
                eprintln!("{}", error);
            }

            RunStatus::StaticError
        } else {
            match self.interpreter.interpret(&statements) {
                Ok(()) => RunStatus::Ok,
                Err(e) => {
                    eprintln!("{}", e);
                    RunStatus::RuntimeError
                }
            }
        };

        if self.interactive {
            self.retain_declarations(statements);
        }

        status
    }

    /// Move this line's function/class declaration statements into the
    /// session arena; everything else drops with the line.
    fn retain_declarations(&mut self, statements: Vec<Stmt>) {
        for stmt in statements {
            if matches!(stmt, Stmt::Function(_) | Stmt::Class { .. }) {
                self.retained.push(stmt);
            }
        }

        debug!("Session arena holds {} declaration(s)", self.retained.len());
    }

    /// The interpreter's output sink (tests read captured `print` output).
    pub fn output(&self) -> &W {
        self.interpreter.output()
    }
}

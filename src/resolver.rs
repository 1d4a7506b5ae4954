//! Static resolver pass for the **Fern** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str,bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, forward-read in initializer, invalid
//!    `return`/`break`/`this`/`super`, bad inheritance).
//! 3. Record, for *each* variable occurrence, whether it's a local (and at what
//!    depth) or a global — into a [`Bindings`] side table keyed by the node's
//!    [`ExprId`], so the AST itself stays immutable and the interpreter never
//!    falls back to dynamic lookup that would see a later shadowing local.

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{Diagnostics, FernError, Result};
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;
use std::rc::Rc;

/// Where a resolved reference lives: a frame at a fixed distance, or the
/// global environment (looked up by name at runtime).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Local(usize),
    Global,
}

/// Side table from resolvable node identity to its binding.  Fixed for the
/// remainder of the run once resolution finishes; interactive sessions merge
/// each line's table into the interpreter's.
#[derive(Debug, Default)]
pub struct Bindings {
    slots: HashMap<ExprId, Slot>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    fn note_local(&mut self, id: ExprId, depth: usize) {
        self.slots.insert(id, Slot::Local(depth));
    }

    fn note_global(&mut self, id: ExprId) {
        self.slots.insert(id, Slot::Global);
    }

    /// The binding recorded for `id`, if the node was resolved.
    pub fn slot(&self, id: ExprId) -> Option<Slot> {
        self.slots.get(&id).copied()
    }

    /// Merge another table into this one (ids never collide across lines
    /// because the parser's id counter is session-scoped).
    pub fn merge(&mut self, other: Bindings) {
        self.slots.extend(other.slots);
    }
}

/// Are we inside a user function, and of which flavor?  Validates `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// Are we inside a class body?  Validates `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances (locals vs. globals) into the side table it returns.
pub struct Resolver<'a> {
    bindings: Bindings,
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            bindings: Bindings::new(),
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top-level statements.  Errors accumulate into `diagnostics`
    /// one per failed statement; the returned table covers everything that
    /// resolved cleanly.
    pub fn resolve(mut self, statements: &'a [Stmt], diagnostics: &mut Diagnostics) -> Bindings {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            if let Err(e) = self.resolve_stmt(stmt) {
                diagnostics.report(e);
            }
        }

        self.bindings
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt) -> Result<()> {
        debug!("Resolving stmt: {:?}", stmt);
        match stmt {
            Stmt::Block(statements) => {
                // Push a new anonymous scope for `{ … }`; pop it even when a
                // nested statement fails so sibling statements keep resolving
                // at the right depth.
                self.begin_scope();
                let result = self.resolve_all(statements);
                self.end_scope();
                result?;
            }

            Stmt::Var { name, initializer } => {
                // var declaration: declare → resolve initializer → define
                self.declare(name)?;
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // function declaration: name is visible *inside* its own body
                self.declare(&declaration.name)?;
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function)?;
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing = self.current_class;
                let result = self.resolve_class(name, superclass, methods);
                self.current_class = enclosing;
                result?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;

                self.loop_depth += 1;
                let result = self.resolve_stmt(body);
                self.loop_depth -= 1;
                result?;
            }

            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    return Err(FernError::resolve_at(
                        keyword,
                        "'break' used outside of loop",
                    ));
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(FernError::resolve_at(
                        keyword,
                        "'return' used outside of function",
                    ));
                }
                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(FernError::resolve_at(
                            keyword,
                            "Cannot return a value from an initializer",
                        ));
                    }
                    self.resolve_expr(expr)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_all(&mut self, statements: &'a [Stmt]) -> Result<()> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr) -> Result<()> {
        debug!("Resolving expr: {:?}", expr);
        match expr {
            Expr::Literal { .. } => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(then_branch)?;
                self.resolve_expr(else_branch)?;
            }

            Expr::Variable { name, id } => {
                // Cannot read in own initializer
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme.as_str()) == Some(&false) {
                        return Err(FernError::resolve_at(
                            name,
                            "Cannot read local variable in its own initializer",
                        ));
                    }
                }
                // Bind either local *or* global
                self.resolve_local(*id, name);
            }

            Expr::Assign { name, value, id } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object)?,

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)?;
            }

            Expr::This { keyword, id } => {
                if self.current_class == ClassType::None {
                    return Err(FernError::resolve_at(
                        keyword,
                        "'this' used outside of a class",
                    ));
                }
                self.resolve_local(*id, keyword);
            }

            Expr::Super { keyword, id, .. } => {
                match self.current_class {
                    ClassType::None => {
                        return Err(FernError::resolve_at(
                            keyword,
                            "'super' used outside of a class",
                        ));
                    }
                    ClassType::Class => {
                        return Err(FernError::resolve_at(
                            keyword,
                            "'super' used in a class with no superclass",
                        ));
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword);
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function / class helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, decl: &'a FunctionDecl, ftype: FunctionType) -> Result<()> {
        let enclosing = self.current_function;
        self.current_function = ftype;

        // A function body is a new loop context: `break` inside it must not
        // bind to a loop surrounding the declaration.
        let enclosing_loops = self.loop_depth;
        self.loop_depth = 0;

        self.begin_scope();

        let mut result: Result<()> = Ok(());
        for param in &decl.params {
            if let Err(e) = self.declare(param) {
                result = Err(e);
                break;
            }
            self.define(param);
        }
        if result.is_ok() {
            result = self.resolve_all(&decl.body);
        }

        self.end_scope();

        self.current_function = enclosing;
        self.loop_depth = enclosing_loops;
        result
    }

    /// Resolve a class declaration: its name, its superclass reference, and
    /// its methods inside `super`/`this` scopes mirroring the environment
    /// chain the interpreter will build.
    fn resolve_class(
        &mut self,
        name: &'a Token,
        superclass: &'a Option<Expr>,
        methods: &'a [Rc<FunctionDecl>],
    ) -> Result<()> {
        self.current_class = ClassType::Class;

        self.declare(name)?;
        self.define(name);

        if let Some(sc) = superclass {
            if let Expr::Variable { name: sc_name, .. } = sc {
                if sc_name.lexeme == name.lexeme {
                    return Err(FernError::resolve_at(
                        sc_name,
                        "A class cannot inherit from itself",
                    ));
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(sc)?;

            self.begin_scope();
            self.define_name("super");
        }

        self.begin_scope();
        self.define_name("this");

        let mut result: Result<()> = Ok(());
        for method in methods {
            let ftype = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            result = self.resolve_function(method, ftype);
            if result.is_err() {
                break;
            }
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &'a Token) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme.as_str()) {
                return Err(FernError::resolve_at(
                    name,
                    "Variable already declared in this scope",
                ));
            }
            scope.insert(&name.lexeme, false);
        }
        Ok(())
    }

    fn define(&mut self, name: &'a Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(&name.lexeme, true);
        }
    }

    /// Mark an implicit binding (`this` / `super`) as defined in the current
    /// scope.
    fn define_name(&mut self, name: &'a str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as either:
    ///  - a local at depth `d`, or
    ///  - a global if not found in *any* scope.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        // 1. check innermost → outermost
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme.as_str()) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.bindings.note_local(id, depth);
                return;
            }
        }

        // 2. not found in any local scope ⇒ global
        debug!("Resolved '{}' as global", name.lexeme);

        self.bindings.note_global(id);
    }
}

impl<'a> Default for Resolver<'a> {
    fn default() -> Self {
        Self::new()
    }
}

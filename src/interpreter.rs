//! Tree-walking interpreter: executes statements and evaluates expressions
//! against the chained environment model.
//!
//! Non-local control flow (function `return`, loop `break`) travels as
//! [`Signal`] variants distinct from runtime faults, so the `?` plumbing that
//! unwinds a fault can never be confused with a control transfer: `Return` is
//! caught at the call boundary, `Break` by the nearest `while`, and `Fault`
//! unwinds the whole run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::environment::Environment;
use crate::error::FernError;
use crate::resolver::{Bindings, Slot};
use crate::token::{Token, TokenType};
use crate::value::{ClassObject, InstanceObject, UserFunction, Value};

/// Everything that can interrupt straight-line execution.
#[derive(Error, Debug)]
pub enum Signal {
    /// A real runtime error; unwinds all pending evaluation.
    #[error(transparent)]
    Fault(#[from] FernError),

    /// `return` — carries the value to the nearest call boundary.
    #[error("return signal")]
    Return(Value),

    /// `break` — terminates the nearest enclosing loop.
    #[error("break signal")]
    Break,
}

/// Convenient alias for interpreter results.
pub type Exec<T> = std::result::Result<T, Signal>;

/// The interpreter: owns the global frame, the currently active frame, and
/// the resolver's binding table.  Generic over its output sink so `print`
/// can write into a buffer under test and stdout in production.
pub struct Interpreter<W: Write = std::io::Stdout> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    bindings: Bindings,
    out: W,
}

impl Interpreter<std::io::Stdout> {
    /// Creates a new Interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(std::io::stdout())
    }
}

impl Default for Interpreter<std::io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter printing to `out`.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        Self {
            environment: globals.clone(),
            globals,
            bindings: Bindings::new(),
            out,
        }
    }

    /// Merge a freshly resolved binding table in.  Interactive sessions call
    /// this once per line; file runs once per program.
    pub fn add_bindings(&mut self, bindings: Bindings) {
        self.bindings.merge(bindings);
    }

    /// The output sink (tests read captured `print` output back from it).
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Interprets a list of statements (a "program").  The first runtime
    /// fault halts execution and is returned; `return`/`break` can never
    /// reach here because the resolver rejects them outside their contexts.
    pub fn interpret(&mut self, statements: &[Stmt]) -> crate::error::Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Err(signal) = self.execute(stmt) {
                return Err(match signal {
                    Signal::Fault(e) => e,
                    Signal::Return(_) | Signal::Break => {
                        unreachable!("control signal escaped to top level")
                    }
                });
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────── statements ────────────────────────────

    /// Executes a single statement.
    fn execute(&mut self, stmt: &Stmt) -> Exec<()> {
        match stmt {
            Stmt::Expression(expr) => {
                let _ = self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value).map_err(FernError::Io)?;
                debug!("Printed value: {}", value);
                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };

                debug!("Variable '{}' defined with value: {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(())
            }

            Stmt::Block(statements) => {
                let frame = Environment::with_enclosing(self.environment.clone());
                self.execute_block(statements, Rc::new(RefCell::new(frame)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)?;
                }
                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body) {
                        Err(Signal::Break) => {
                            debug!("Break signal caught by while loop");
                            break;
                        }
                        other => other?,
                    }
                }
                Ok(())
            }

            Stmt::Break { .. } => Err(Signal::Break),

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                // Capture the current environment as the closure.
                let function = UserFunction {
                    declaration: declaration.clone(),
                    closure: self.environment.clone(),
                    is_initializer: false,
                };

                self.environment.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Err(Signal::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass, methods),
        }
    }

    /// Executes statements inside `environment`, restoring the previous
    /// frame afterwards even when a signal unwinds.
    fn execute_block(&mut self, statements: &[Stmt], environment: Rc<RefCell<Environment>>) -> Exec<()> {
        let previous = self.environment.clone();
        self.environment = environment;

        let mut result: Exec<()> = Ok(());
        for stmt in statements {
            result = self.execute(stmt);
            if result.is_err() {
                break;
            }
        }

        self.environment = previous;
        result
    }

    /// Evaluates a class declaration: validate the superclass, build the
    /// (immutable) method table, and bind the class name.
    fn execute_class(
        &mut self,
        name: &Token,
        superclass: &Option<Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Exec<()> {
        debug!("Declaring class '{}'", name.lexeme);

        let superclass_value: Option<Rc<ClassObject>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(sc) => Some(sc),
                _ => {
                    return Err(
                        FernError::inheritance(expr.line(), "Superclass must be a class.").into(),
                    );
                }
            },
            None => None,
        };

        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        // Methods close over a chain that includes `super` when inheriting,
        // mirroring the scopes the resolver pushed around method bodies.
        let method_closure: Rc<RefCell<Environment>> = match &superclass_value {
            Some(sc) => {
                let mut frame = Environment::with_enclosing(self.environment.clone());
                frame.define("super", Value::Class(sc.clone()));
                Rc::new(RefCell::new(frame))
            }
            None => self.environment.clone(),
        };

        let mut method_table: HashMap<String, Rc<UserFunction>> = HashMap::new();
        for method in methods {
            let function = UserFunction {
                declaration: method.clone(),
                closure: method_closure.clone(),
                is_initializer: method.name.lexeme == "init",
            };

            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = ClassObject {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_table,
        };

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)), name.line)?;

        Ok(())
    }

    // ─────────────────────────── expressions ───────────────────────────

    /// Evaluates an expression and returns a Value.
    fn evaluate(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::Str(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                match operator.token_type {
                    TokenType::OR if left_val.is_truthy() => Ok(left_val),
                    TokenType::AND if !left_val.is_truthy() => Ok(left_val),
                    _ => self.evaluate(right),
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                // Only the selected branch is evaluated.
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { name, id } => self.look_up_variable(name, *id),

            Expr::Assign { name, value, id } => {
                let value = self.evaluate(value)?;
                self.assign_variable(name, *id, value.clone())?;
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut arg_values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(&callee_val, paren, arg_values)
            }

            Expr::Get { object, name } => {
                let object_value = self.evaluate(object)?;
                self.get_property(&object_value, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_value = self.evaluate(object)?;

                let Value::Instance(instance) = object_value else {
                    return Err(
                        FernError::type_error(name.line, "Only instances have fields.").into(),
                    );
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set_field(&name.lexeme, value.clone());
                Ok(value)
            }

            Expr::This { keyword, id } => self.look_up_variable(keyword, *id),

            Expr::Super {
                keyword,
                method,
                id,
            } => self.evaluate_super(keyword, method, *id),
        }
    }

    /// Evaluates a unary expression.
    fn evaluate_unary(&mut self, op: &Token, expr: &Expr) -> Exec<Value> {
        let right_val = self.evaluate(expr)?;

        match op.token_type {
            TokenType::MINUS => {
                if let Value::Number(n) = right_val {
                    Ok(Value::Number(-n))
                } else {
                    Err(FernError::type_error(op.line, "Operand must be a number.").into())
                }
            }

            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),

            _ => Err(FernError::type_error(op.line, "Invalid unary operator.").into()),
        }
    }

    /// Evaluates a binary expression.  Both operands evaluate left-to-right
    /// before the operator applies.
    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Exec<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                _ => Err(FernError::type_error(
                    op.line,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                _ => Err(FernError::type_error(op.line, "Operands must be numbers.").into()),
            },

            TokenType::STAR => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                _ => Err(FernError::type_error(op.line, "Operands must be numbers.").into()),
            },

            // IEEE-754 passthrough: x/0 is ±inf, 0/0 is NaN, never an error.
            TokenType::SLASH => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
                _ => Err(FernError::type_error(op.line, "Operands must be numbers.").into()),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::LESS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
                _ => Err(FernError::type_error(op.line, "Operands must be numbers.").into()),
            },

            TokenType::LESS_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
                _ => Err(FernError::type_error(op.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
                _ => Err(FernError::type_error(op.line, "Operands must be numbers.").into()),
            },

            TokenType::GREATER_EQUAL => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
                _ => Err(FernError::type_error(op.line, "Operands must be numbers.").into()),
            },

            _ => Err(FernError::type_error(op.line, "Invalid binary operator.").into()),
        }
    }

    // ───────────────────────── variable access ─────────────────────────

    /// Read a variable through its resolved slot: an exact frame distance
    /// for locals, a by-name global lookup otherwise.
    fn look_up_variable(&self, name: &Token, id: ExprId) -> Exec<Value> {
        match self.bindings.slot(id) {
            Some(Slot::Local(depth)) => {
                Ok(Environment::get_at(&self.environment, depth, &name.lexeme, name.line)?)
            }

            Some(Slot::Global) | None => {
                Ok(self.globals.borrow().get(&name.lexeme, name.line)?)
            }
        }
    }

    fn assign_variable(&mut self, name: &Token, id: ExprId, value: Value) -> Exec<()> {
        match self.bindings.slot(id) {
            Some(Slot::Local(depth)) => Ok(Environment::assign_at(
                &self.environment,
                depth,
                &name.lexeme,
                value,
                name.line,
            )?),

            Some(Slot::Global) | None => {
                Ok(self.globals.borrow_mut().assign(&name.lexeme, value, name.line)?)
            }
        }
    }

    // ──────────────────────────── calls ────────────────────────────────

    /// Invokes a callable (native, user function, or class constructor).
    fn invoke_callable(&mut self, callee_val: &Value, paren: &Token, arg_values: Vec<Value>) -> Exec<Value> {
        match callee_val {
            Value::Native(native) => {
                debug!("Calling native function '{}'", native.name);

                if arg_values.len() != native.arity {
                    return Err(self.arity_error(paren, native.arity, arg_values.len()));
                }

                Ok((native.func)(&arg_values)?)
            }

            Value::Function(function) => {
                if arg_values.len() != function.arity() {
                    return Err(self.arity_error(paren, function.arity(), arg_values.len()));
                }

                self.call_function(function, arg_values)
            }

            Value::Class(class) => {
                if arg_values.len() != class.arity() {
                    return Err(self.arity_error(paren, class.arity(), arg_values.len()));
                }

                self.instantiate(class, arg_values)
            }

            _ => Err(FernError::call(paren.line, "Can only call functions and classes.").into()),
        }
    }

    fn arity_error(&self, paren: &Token, expected: usize, got: usize) -> Signal {
        FernError::arity(
            paren.line,
            format!("Expected {} arguments but got {}.", expected, got),
        )
        .into()
    }

    /// Calls a user function: a fresh frame chained to the function's
    /// *defining* environment (not the caller's — this is what makes
    /// closures work), parameters bound there, body run inside it.
    fn call_function(&mut self, function: &Rc<UserFunction>, arguments: Vec<Value>) -> Exec<Value> {
        debug!("Calling function '{}'", function.name());

        let mut frame = Environment::with_enclosing(function.closure.clone());
        for (param, value) in function.declaration.params.iter().zip(arguments) {
            frame.define(&param.lexeme, value);
        }

        let result = self.execute_block(&function.declaration.body, Rc::new(RefCell::new(frame)));

        match result {
            // Falling off the end yields nil — except `init`, which always
            // answers with its instance.
            Ok(()) => {
                if function.is_initializer {
                    Ok(self.initializer_instance(function)?)
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Signal::Return(value)) => {
                debug!("Function '{}' returned: {}", function.name(), value);

                if function.is_initializer {
                    Ok(self.initializer_instance(function)?)
                } else {
                    Ok(value)
                }
            }

            Err(other) => Err(other),
        }
    }

    /// The `this` an initializer was bound to (distance 0 in its closure).
    fn initializer_instance(&self, function: &UserFunction) -> Exec<Value> {
        Ok(Environment::get_at(
            &function.closure,
            0,
            "this",
            function.declaration.name.line,
        )?)
    }

    /// Calling a class: construct the instance, run a bound `init` when one
    /// exists, and always yield the new instance.
    fn instantiate(&mut self, class: &Rc<ClassObject>, arguments: Vec<Value>) -> Exec<Value> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Rc::new(RefCell::new(InstanceObject::new(class.clone())));

        if let Some(init) = class.find_method("init") {
            let bound = Rc::new(init.bind(instance.clone()));
            self.call_function(&bound, arguments)?;
        }

        Ok(Value::Instance(instance))
    }

    // ───────────────────────── property access ─────────────────────────

    /// `object.name`: own fields shadow methods; a method hit binds to the
    /// instance on the fly, so every access yields a fresh callable.
    fn get_property(&self, value: &Value, name: &Token) -> Exec<Value> {
        let Value::Instance(instance) = value else {
            return Err(FernError::type_error(name.line, "Only instances have properties.").into());
        };

        if let Some(field) = instance.borrow().field(&name.lexeme) {
            return Ok(field);
        }

        let method = instance.borrow().class().find_method(&name.lexeme);

        match method {
            Some(m) => Ok(Value::Function(Rc::new(m.bind(instance.clone())))),
            None => Err(FernError::name(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )
            .into()),
        }
    }

    /// `super.method`: the superclass sits at the resolved distance, the
    /// receiver one frame closer; the method resolves in the superclass
    /// chain but binds to the *current* instance.
    fn evaluate_super(&mut self, keyword: &Token, method: &Token, id: ExprId) -> Exec<Value> {
        let depth = match self.bindings.slot(id) {
            Some(Slot::Local(depth)) => depth,
            _ => {
                return Err(FernError::name(keyword.line, "Undefined variable 'super'.").into());
            }
        };

        let superclass = match Environment::get_at(&self.environment, depth, "super", keyword.line)? {
            Value::Class(sc) => sc,
            _ => {
                return Err(
                    FernError::inheritance(keyword.line, "Superclass must be a class.").into(),
                );
            }
        };

        let object = Environment::get_at(&self.environment, depth - 1, "this", keyword.line)?;
        let Value::Instance(instance) = object else {
            return Err(
                FernError::type_error(keyword.line, "Only instances have properties.").into(),
            );
        };

        match superclass.find_method(&method.lexeme) {
            Some(m) => Ok(Value::Function(Rc::new(m.bind(instance)))),
            None => Err(FernError::name(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
            .into()),
        }
    }
}

//! Runtime value model: the tagged union every expression evaluates to, plus
//! the callable / class / instance objects behind it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;

/// A user-defined function or method: the shared declaration node plus the
/// environment that was active at its definition point.  That captured frame
/// is what makes closures work — calls chain to it, not to the caller.
pub struct UserFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl UserFunction {
    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produce a bound method: a fresh function whose closure chain starts
    /// with a frame defining `this`.  Every property access binds anew, so
    /// two accesses yield two independent callables.
    pub fn bind(&self, instance: Rc<RefCell<InstanceObject>>) -> UserFunction {
        let mut frame = Environment::with_enclosing(self.closure.clone());
        frame.define("this", Value::Instance(instance));

        UserFunction {
            declaration: self.declaration.clone(),
            closure: Rc::new(RefCell::new(frame)),
            is_initializer: self.is_initializer,
        }
    }
}

// Closure frames can reach back to the function that captured them, so Debug
// must not descend into `closure`.
impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

/// Host-provided function.  Reserved extension point — the base language
/// installs none, but the call machinery dispatches on it.
#[derive(Debug)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> crate::error::Result<Value>,
}

/// A class: immutable method table plus optional superclass link.  Built
/// once when its declaration executes, never mutated afterwards.
#[derive(Debug)]
pub struct ClassObject {
    pub name: String,
    pub superclass: Option<Rc<ClassObject>>,
    pub methods: HashMap<String, Rc<UserFunction>>,
}

impl ClassObject {
    /// Walk the method-resolution chain (self, then ancestors) for `name`.
    /// Nearest-defining-class wins, which is what makes overrides shadow
    /// inherited methods.
    pub fn find_method(&self, name: &str) -> Option<Rc<UserFunction>> {
        let mut current: Option<&ClassObject> = Some(self);

        while let Some(class) = current {
            if let Some(method) = class.methods.get(name) {
                return Some(method.clone());
            }

            current = class.superclass.as_deref();
        }

        None
    }

    /// Calling a class forwards its arguments to `init`; a class without one
    /// takes no arguments.
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

/// An instance: back-reference to its class plus a private field table,
/// mutable only through property-set.
pub struct InstanceObject {
    class: Rc<ClassObject>,
    fields: HashMap<String, Value>,
}

// Fields may hold the instance itself, so Debug reports only the shape.
impl fmt::Debug for InstanceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceObject")
            .field("class", &self.class.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

impl InstanceObject {
    pub fn new(class: Rc<ClassObject>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<ClassObject> {
        &self.class
    }

    /// Read an own field.  Method lookup is the interpreter's job — fields
    /// shadow methods, so this is checked first.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    /// Property-set writes straight into the own field table, independent of
    /// any method of the same name.
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

/// Tagged runtime value union.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Function(Rc<UserFunction>),
    Native(Rc<NativeFunction>),
    Class(Rc<ClassObject>),
    Instance(Rc<RefCell<InstanceObject>>),
}

impl Value {
    /// Truthiness rule: `nil` and `false` are falsey, everything else —
    /// including `0` and `""` — is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl PartialEq for Value {
    /// Total equality over the union: `nil` equals only `nil`, same-kind
    /// primitives compare by value, callables/classes/instances by identity,
    /// different kinds are never equal.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                // Integral results print without a fractional part; everything
                // else uses the shortest round-trip decimal.
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.2e18 {
                    let mut buf: itoa::Buffer = itoa::Buffer::new();

                    f.write_str(buf.format(*n as i64))
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::Str(s) => write!(f, "{}", s),

            Value::Function(fun) => write!(f, "<fn {}>", fun.name()),

            Value::Native(native) => write!(f, "<native fn {}>", native.name),

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => {
                write!(f, "{} instance", instance.borrow().class.name)
            }
        }
    }
}

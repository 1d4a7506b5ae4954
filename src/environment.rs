use crate::error::{FernError, Result};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One scope frame: name→value bindings plus a link to the enclosing frame.
///
/// Frames are shared (`Rc<RefCell<...>>`) because a closure keeps the frame
/// that was active at its definition alive for as long as the closure itself
/// lives, independent of the call that created it.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Introduce (or overwrite) a binding in *this* frame.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup by name, walking out through enclosing frames.  Used
    /// for references the resolver marked global.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(FernError::name(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Dynamic assignment by name, walking out through enclosing frames.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(FernError::name(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Read a binding at an exact resolver-computed distance.  The resolver
    /// guarantees the frame at that depth declares the name; a miss here is
    /// still reported as a name error rather than a panic.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str, line: usize) -> Result<Value> {
        let frame = Environment::ancestor(env, distance);
        let borrowed = frame.borrow();

        match borrowed.values.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(FernError::name(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }

    /// Write a binding at an exact resolver-computed distance.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        let frame = Environment::ancestor(env, distance);
        let mut borrowed = frame.borrow_mut();

        if borrowed.values.contains_key(name) {
            borrowed.values.insert(name.to_string(), value);
            Ok(())
        } else {
            Err(FernError::name(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Hop `distance` links out from `env`.  A resolver bug is the only way
    /// to run past the chain's end, so the walk saturates at the outermost
    /// frame instead of panicking.
    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current = env.clone();

        for _ in 0..distance {
            let next = match &current.borrow().enclosing {
                Some(enclosing) => enclosing.clone(),
                None => break,
            };

            current = next;
        }

        current
    }
}

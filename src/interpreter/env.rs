use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, EvalErrorKind};
use crate::interpreter::primitives::PRIMITIVES;
use crate::interpreter::value::{Procedure, Value};

/// One frame of the scope chain. Frames are shared: a closure keeps its
/// defining frame alive for as long as the closure itself lives.
#[derive(Default)]
pub struct Env {
    pub parent: Option<Rc<RefCell<Env>>>,
    pub values: HashMap<String, Value>,
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.parent {
            Some(ref parent) => write!(f, "<Env {} {:?}>", self.values.len(), parent.borrow()),
            None => write!(f, "<Env {}>", self.values.len()),
        }
    }
}

impl Env {
    /// A root frame with no bindings at all.
    pub fn new_empty() -> Rc<RefCell<Env>> { Rc::new(RefCell::new(Env::default())) }

    /// A root frame holding every primitive procedure.
    pub fn new_root() -> Rc<RefCell<Env>> {
        let mut env = Env::default();
        for (name, op) in PRIMITIVES.entries() {
            env.define(name.to_string(), Value::Procedure(Procedure::Primitive(*op)));
        }
        Rc::new(RefCell::new(env))
    }

    pub fn new_child(parent: Rc<RefCell<Env>>) -> Rc<RefCell<Env>> {
        let env = Env {
            parent: Some(parent),
            values: HashMap::new(),
        };
        Rc::new(RefCell::new(env))
    }

    /// A child of `parent` binding `params` to `args` positionally.
    pub fn extend(parent: &Rc<RefCell<Env>>, params: &[String], args: Vec<Value>) -> Result<Rc<RefCell<Env>>, Error> {
        if params.len() != args.len() {
            return Err(EvalErrorKind::WrongNumberOfArguments {
                actual: args.len(),
                expected: params.len(),
                or_more: false,
            }
            .into());
        }
        let child = Env::new_child(parent.clone());
        {
            let mut frame = child.borrow_mut();
            for (name, value) in params.iter().zip(args) {
                frame.define(name.clone(), value);
            }
        }
        Ok(child)
    }

    // Insert or overwrite in this frame only; outer bindings are shadowed, never touched.
    pub fn define(&mut self, key: String, value: Value) {
        trace!("define {}", key);
        self.values.insert(key, value);
    }

    /// Overwrite the nearest existing binding of `key` with the thunk's value.
    /// The thunk runs only once the binding is known to exist.
    pub fn assign<F>(env: &Rc<RefCell<Env>>, key: &str, value: F) -> Result<(), Error>
    where
        F: FnOnce() -> Result<Value, Error>,
    {
        let frame = match Env::frame_of(env, key) {
            Some(frame) => frame,
            None => return Err(EvalErrorKind::UnknownIdentifier(key.to_string()).into()),
        };
        let value = value()?;
        frame.borrow_mut().values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn lookup(&self, key: &str) -> Result<Value, Error> {
        match self.values.get(key) {
            Some(val) => Ok(val.clone()),
            None => match self.parent {
                Some(ref parent) => parent.borrow().lookup(key),
                None => Err(EvalErrorKind::UnknownIdentifier(key.to_string()).into()),
            },
        }
    }

    /// The innermost frame, starting at `env`, that binds `key`.
    fn frame_of(env: &Rc<RefCell<Env>>, key: &str) -> Option<Rc<RefCell<Env>>> {
        let mut current = env.clone();
        loop {
            let parent = {
                let frame = current.borrow();
                if frame.values.contains_key(key) {
                    return Some(current.clone());
                }
                frame.parent.clone()?
            };
            current = parent;
        }
    }
}

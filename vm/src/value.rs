use std::cell::RefCell;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

use ahash::AHashMap;

use crate::object::Callable;

/// A scope's local names. Shared, so `defs` can hand out a live view of a running frame.
pub type Bindings = AHashMap<String, Value>;

#[derive(Clone)]
pub enum Value {
    Str(Rc<str>),
    Int(i64),
    Float(f64),
    Null,
    Callable(Rc<dyn Callable>),
    Defs(Rc<RefCell<Bindings>>),
}

impl Value {
    /// Zero (of either number type) and null are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(val) => *val != 0,
            Value::Float(val) => *val != 0.0,
            Value::Null => false,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Null => "null",
            Value::Callable(_) => "function",
            Value::Defs(_) => "defs",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(lhs), Value::Str(rhs)) => lhs == rhs,
            (Value::Int(lhs), Value::Int(rhs)) => lhs == rhs,
            (Value::Float(lhs), Value::Float(rhs)) => lhs == rhs,
            (Value::Null, Value::Null) => true,
            (Value::Callable(lhs), Value::Callable(rhs)) => {
                Rc::as_ptr(lhs) as *const u8 == Rc::as_ptr(rhs) as *const u8
            }
            (Value::Defs(lhs), Value::Defs(rhs)) => Rc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

// A binding table can hold itself (`d := defs`), so tables nested inside a table are only
// sketched.
fn write_defs(f: &mut Formatter<'_>, defs: &RefCell<Bindings>) -> fmt::Result {
    let defs = defs.borrow();
    let mut names: Vec<&String> = defs.keys().collect();
    names.sort();

    write!(f, "{{")?;
    for (idx, name) in names.into_iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        match &defs[name] {
            Value::Defs(_) => write!(f, "{}: {{...}}", name)?,
            value => write!(f, "{}: {}", name, value)?,
        }
    }
    write!(f, "}}")
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(val) => write!(f, "{}", val),
            Value::Int(val) => write!(f, "{}", val),
            Value::Float(val) => write!(f, "{}", val),
            Value::Null => write!(f, "null"),
            Value::Callable(val) => write!(f, "<function {}>", val.name()),
            Value::Defs(defs) => write_defs(f, defs),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(val) => write!(f, "Str({:?})", val),
            Value::Int(val) => write!(f, "Int({})", val),
            Value::Float(val) => write!(f, "Float({:?})", val),
            Value::Null => write!(f, "Null"),
            Value::Callable(val) => write!(f, "Callable({:?})", val),
            Value::Defs(defs) => {
                write!(f, "Defs(")?;
                write_defs(f, defs)?;
                write!(f, ")")
            }
        }
    }
}

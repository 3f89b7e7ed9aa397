//! Dynamic Value type shared by the kernel core
//!
//! The object system itself lives outside this crate. `Value` only carries
//! what the resolver, the exit engine and the autoload registry need to see:
//! plain data, symbols, error classes and instances, owning scopes and opaque
//! host objects.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorClass, ErrorRef, KResult};
use crate::scope::ScopeRef;

/// Interned-by-content name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

/// An object owned by the host object system.
///
/// The kernel never looks inside host objects. It asks for a class name and an
/// inspect string when rendering messages, and for the conversion-to-error
/// capability when an object is passed to `raise`.
pub trait HostObject: Send + Sync + fmt::Debug {
    fn class_name(&self) -> &str;

    fn inspect(&self) -> String {
        format!("#<{}>", self.class_name())
    }

    /// The `exception` capability.
    ///
    /// `None` means the object does not respond to it at all. Otherwise the
    /// returned value is what the capability produced, which the caller still
    /// has to check for being an error instance.
    fn to_exception(&self, _message: Option<&Value>) -> Option<KResult<Value>> {
        None
    }
}

/// Dynamic value
#[derive(Debug, Clone)]
pub enum Value {
    // ========== Immediates ==========
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Symbol(Symbol),

    // ========== Heap-Allocated Types ==========
    Str(String),
    Array(Vec<Value>),

    // ========== Runtime Objects ==========
    /// Error instance
    Error(ErrorRef),
    /// Error class (responds to `exception` by instantiating itself)
    ErrorClass(ErrorClass),
    /// Module-like owning scope with a constant table
    Scope(ScopeRef),
    /// Opaque object from the host object system
    Object(Arc<dyn HostObject>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.to_string())
    }

    pub fn sym(name: &str) -> Self {
        Value::Symbol(Symbol::new(name))
    }

    pub fn object<T: HostObject + 'static>(obj: T) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Class name of this value as the language reports it
    pub fn class_name(&self) -> &str {
        match self {
            Value::Nil => "NilClass",
            Value::Bool(true) => "TrueClass",
            Value::Bool(false) => "FalseClass",
            Value::Int(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Symbol(_) => "Symbol",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Error(err) => err.class().name(),
            Value::ErrorClass(_) => "Class",
            Value::Scope(_) => "Module",
            Value::Object(obj) => obj.class_name(),
        }
    }

    /// Developer-facing rendering (`inspect`)
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(x) => format!("{:?}", x),
            Value::Symbol(s) => format!(":{}", s),
            Value::Str(s) => format!("{:?}", s),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::inspect).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Error(err) => {
                let text = err.message_text();
                if text.is_empty() {
                    err.class().name().to_string()
                } else {
                    format!("#<{}: {}>", err.class().name(), text)
                }
            }
            Value::ErrorClass(class) => class.name().to_string(),
            Value::Scope(scope) => scope.name().to_string(),
            Value::Object(obj) => obj.inspect(),
        }
    }

    /// User-facing rendering (`to_s`)
    pub fn to_text(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Str(s) => s.clone(),
            Value::Symbol(s) => s.to_string(),
            Value::Error(err) => err.message_text(),
            _ => self.inspect(),
        }
    }

    /// Text of a string or symbol, the two forms accepted where a name is expected
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            (Value::ErrorClass(a), Value::ErrorClass(b)) => a == b,
            (Value::Scope(a), Value::Scope(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<ErrorRef> for Value {
    fn from(err: ErrorRef) -> Self {
        Value::Error(err)
    }
}

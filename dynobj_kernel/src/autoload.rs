//! Lazy binding registry (autoload)
//!
//! `autoload(scope, :Foo, "foo")` reserves `Foo` in `scope` with an
//! [`AutoloadEntry`]. The first read through [`Scope::resolve_constant`] runs
//! the entry's load, which asks the runtime's [`LoadOnce`] collaborator to
//! load `"foo"` and then reads the now-defined `Foo` back from the scope.
//!
//! The entry lives inside the constant slot, so reserving a name and creating
//! its entry is a single table write.

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::ExecutionContext;
use crate::diagnostics::load_trace;
use crate::error::{ErrorObject, KResult};
use crate::loader::LoadOnce;
use crate::scope::{ConstantSlot, Scope, ScopeRef};
use crate::value::{Symbol, Value};

static CONSTANT_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_]*$").ok());

/// Whether `name` is a syntactically valid constant name
pub fn is_constant_name(name: &str) -> bool {
    CONSTANT_NAME
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

/// A pending lazy binding
pub struct AutoloadEntry {
    scope: Weak<Scope>,
    name: Symbol,
    qualified_name: String,
    source: String,
}

impl fmt::Debug for AutoloadEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoloadEntry")
            .field("qualified_name", &self.qualified_name)
            .field("source", &self.source)
            .finish()
    }
}

impl AutoloadEntry {
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The load-operation.
    ///
    /// `Ok(None)` means this call did not perform the load (it was already
    /// done, or is in flight elsewhere) or the load did not define the
    /// binding; the caller must not bind a value in either case.
    pub fn load(&self, ctx: &mut ExecutionContext) -> KResult<Option<Value>> {
        let loader = Arc::clone(ctx.runtime().autoload().loader());
        let performed = loader.load_once(ctx, &self.source)?;
        if !performed {
            load_trace(format_args!("{}: {} not loaded here", self.qualified_name, self.source));
            return Ok(None);
        }

        let Some(scope) = self.scope.upgrade() else {
            return Ok(None);
        };
        match scope.constant(self.name.as_str()) {
            Some(value) => Ok(Some(value)),
            None => {
                load_trace(format_args!(
                    "{}: {} loaded without defining it",
                    self.qualified_name, self.source
                ));
                scope.forget_entry(self.name.as_str(), self);
                Ok(None)
            }
        }
    }
}

/// Runtime-wide autoload state: the load-once collaborator entries load through
#[derive(Debug)]
pub struct AutoloadRegistry {
    loader: Arc<dyn LoadOnce>,
}

impl AutoloadRegistry {
    pub fn new(loader: Arc<dyn LoadOnce>) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &Arc<dyn LoadOnce> {
        &self.loader
    }

    /// Reserve `name` in `scope` for lazy loading from `source`.
    ///
    /// A name that already has a value is left alone. A waiting reservation is
    /// replaced by the new one; a reservation whose load is in flight is kept.
    pub fn register(&self, scope: &ScopeRef, name: &str, source: &str) -> Result<(), ErrorObject> {
        if !is_constant_name(name) {
            return Err(ErrorObject::autoload_name_format(name));
        }
        if source.is_empty() {
            return Err(ErrorObject::autoload_empty_source());
        }

        let mut constants = scope.write_constants();
        match constants.get(name) {
            Some(ConstantSlot::Value(_)) | Some(ConstantSlot::Pending(_)) => {}
            Some(ConstantSlot::Undefined(_)) | None => {
                let entry = AutoloadEntry {
                    scope: Arc::downgrade(scope),
                    name: Symbol::new(name),
                    qualified_name: scope.qualified(name),
                    source: source.to_string(),
                };
                load_trace(format_args!("{}: registered from {}", entry.qualified_name, source));
                constants.insert(Symbol::new(name), ConstantSlot::Undefined(Arc::new(entry)));
            }
        }
        Ok(())
    }

    /// Source registered for `name`, while the reservation exists
    pub fn query(&self, scope: &Scope, name: &str) -> Option<String> {
        scope
            .slot(name)
            .and_then(|slot| slot.entry().map(|entry| entry.source.clone()))
    }
}

/// Constant name argument: a symbol or a string
fn name_argument(value: &Value) -> Result<&str, ErrorObject> {
    value
        .as_name()
        .ok_or_else(|| ErrorObject::type_error(&format!("{} is not a symbol", value.inspect())))
}

/// Source descriptor argument: a string or a symbol's text
fn source_argument(value: &Value) -> Result<&str, ErrorObject> {
    value.as_name().ok_or_else(|| {
        ErrorObject::type_error(&format!("can't convert {} into String", value.class_name()))
    })
}

impl ExecutionContext {
    /// `autoload(name, source)` on `scope`. Returns `nil`.
    pub fn autoload(&mut self, scope: &ScopeRef, name: &Value, source: &Value) -> KResult<Value> {
        let registered = name_argument(name).and_then(|name| {
            let source = source_argument(source)?;
            self.runtime().autoload().register(scope, name, source)
        });
        match registered {
            Ok(()) => Ok(Value::Nil),
            Err(err) => Err(self.raise_prepared(err)),
        }
    }

    /// `autoload?(name)` on `scope`: the registered source, or `nil`
    pub fn autoload_p(&mut self, scope: &ScopeRef, name: &Value) -> KResult<Value> {
        let name = match name_argument(name) {
            Ok(name) => name,
            Err(err) => return Err(self.raise_prepared(err)),
        };
        Ok(self
            .runtime()
            .autoload()
            .query(scope, name)
            .map_or(Value::Nil, Value::Str))
    }

    /// Constant read through `scope`, triggering autoload as needed
    pub fn resolve_constant(&mut self, scope: &ScopeRef, name: &str) -> KResult<Value> {
        scope.resolve_constant(self, name)
    }
}

//! Owning scopes and their constant tables.
//!
//! A slot is never an untyped sentinel: it is either a concrete value or an
//! autoload entry that is waiting (`Undefined`) or being loaded (`Pending`).
//! Registering an autoload stores the entry inside the slot under the table's
//! write lock, so a reader sees either the entry or a value, never neither.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::autoload::AutoloadEntry;
use crate::context::ExecutionContext;
use crate::error::{ErrorObject, Flow, KResult};
use crate::value::{Symbol, Value};

pub type ScopeRef = Arc<Scope>;

const ROOT_SCOPE_NAME: &str = "Object";

#[derive(Debug, Clone)]
pub enum ConstantSlot {
    /// Reserved by autoload, not loaded yet
    Undefined(Arc<AutoloadEntry>),
    /// Reserved by autoload, a load is in flight
    Pending(Arc<AutoloadEntry>),
    Value(Value),
}

impl ConstantSlot {
    pub fn entry(&self) -> Option<&Arc<AutoloadEntry>> {
        match self {
            ConstantSlot::Undefined(entry) | ConstantSlot::Pending(entry) => Some(entry),
            ConstantSlot::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ConstantSlot::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Module-like scope owning a constant table
pub struct Scope {
    name: String,
    root: bool,
    constants: RwLock<HashMap<Symbol, ConstantSlot>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Constants may hold this scope again; print names only.
        let constants = self.read_constants();
        let mut names: Vec<_> = constants.keys().map(Symbol::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("constants", &names)
            .finish()
    }
}

impl Scope {
    /// The top-level `Object` scope
    pub fn root() -> ScopeRef {
        Arc::new(Scope {
            name: ROOT_SCOPE_NAME.to_string(),
            root: true,
            constants: RwLock::new(HashMap::new()),
        })
    }

    /// Create a scope named `name` inside `self` and bind it as a constant.
    /// Scopes directly under the root are not prefixed with `Object::`.
    pub fn define_scope(&self, name: &str) -> ScopeRef {
        let full_name = if self.root {
            name.to_string()
        } else {
            format!("{}::{}", self.name, name)
        };
        let scope = Arc::new(Scope {
            name: full_name,
            root: false,
            constants: RwLock::new(HashMap::new()),
        });
        self.set_constant(name, Value::Scope(Arc::clone(&scope)));
        scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Scope-qualified binding name, e.g. `Object::Foo`
    pub fn qualified(&self, name: &str) -> String {
        format!("{}::{}", self.name, name)
    }

    pub(crate) fn read_constants(&self) -> RwLockReadGuard<'_, HashMap<Symbol, ConstantSlot>> {
        self.constants
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write_constants(&self) -> RwLockWriteGuard<'_, HashMap<Symbol, ConstantSlot>> {
        self.constants
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn slot(&self, name: &str) -> Option<ConstantSlot> {
        self.read_constants().get(name).cloned()
    }

    /// Concrete value of `name`; autoload reservations read as absent
    pub fn constant(&self, name: &str) -> Option<Value> {
        self.read_constants()
            .get(name)
            .and_then(ConstantSlot::value)
            .cloned()
    }

    /// Bind `name` to `value`, replacing any autoload reservation
    pub fn set_constant(&self, name: &str, value: Value) {
        self.write_constants()
            .insert(Symbol::new(name), ConstantSlot::Value(value));
    }

    pub fn constant_names(&self) -> Vec<Symbol> {
        let mut names: Vec<_> = self.read_constants().keys().cloned().collect();
        names.sort();
        names
    }

    /// Swap the reservation for `entry` between waiting and in flight.
    /// Has no effect once the slot holds a value or another entry.
    fn transition(&self, name: &str, entry: &Arc<AutoloadEntry>, pending: bool) {
        let mut constants = self.write_constants();
        let Some(slot) = constants.get_mut(name) else {
            return;
        };
        let same_entry = slot
            .entry()
            .is_some_and(|current| Arc::ptr_eq(current, entry));
        if same_entry {
            *slot = if pending {
                ConstantSlot::Pending(Arc::clone(entry))
            } else {
                ConstantSlot::Undefined(Arc::clone(entry))
            };
        }
    }

    /// Drop the reservation for `entry` (its load ran without defining the
    /// binding). A later `autoload` may register a fresh entry.
    pub(crate) fn forget_entry(&self, name: &str, entry: &AutoloadEntry) {
        let mut constants = self.write_constants();
        let same_entry = constants
            .get(name)
            .and_then(ConstantSlot::entry)
            .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), entry));
        if same_entry {
            constants.remove(name);
        }
    }

    /// Read `name`, loading it first when it is reserved by autoload.
    ///
    /// This is the constant-lookup path: a reservation is never returned to
    /// the caller. Either the load produces the value or the read fails with
    /// `NameError` (uninitialized constant).
    pub fn resolve_constant(&self, ctx: &mut ExecutionContext, name: &str) -> KResult<Value> {
        let entry = match self.slot(name) {
            Some(ConstantSlot::Value(value)) => return Ok(value),
            Some(ConstantSlot::Undefined(entry)) | Some(ConstantSlot::Pending(entry)) => entry,
            None => return Err(self.uninitialized(ctx, name)),
        };

        self.transition(name, &entry, true);
        match entry.load(ctx) {
            Ok(Some(value)) => Ok(value),
            // Another invocation owns the load; its outcome is in the table
            Ok(None) => match self.constant(name) {
                Some(value) => Ok(value),
                None => {
                    // Nothing is in flight for this read any more. An outer
                    // load on this thread still settles the slot by entry.
                    self.transition(name, &entry, false);
                    Err(self.uninitialized(ctx, name))
                }
            },
            Err(flow) => {
                self.transition(name, &entry, false);
                Err(flow)
            }
        }
    }

    fn uninitialized(&self, ctx: &mut ExecutionContext, name: &str) -> Flow {
        ctx.raise_prepared(ErrorObject::uninitialized_constant(&self.qualified(name), name))
    }
}

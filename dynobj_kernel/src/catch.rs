//! Tagged non-local exit (catch/throw)
//!
//! `enter_catch` pushes a capture point on the current thread's stack and runs
//! the block. `perform_throw` searches that stack innermost-first for a point
//! with an equal tag key, marks it matched and unwinds with
//! [`Flow::Throw`] addressed to the point's id. Only the `enter_catch` call
//! that owns that id turns the signal back into a value; any other catch
//! (including one with an equal tag further out) lets it pass.
//!
//! ```text
//! Active --throw matched--> Matched --popped--> (result = payload)
//!    \--block returned / unrelated flow--> Completed --popped--> (result unchanged)
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::{tag_text, ErrorObject, Flow, KResult};
use crate::thread::ThreadId;
use crate::value::{HostObject, Value};

/// Identity of a capture point, unique per thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureId {
    thread: ThreadId,
    serial: u64,
}

impl CaptureId {
    pub(crate) fn new(thread: ThreadId, serial: u64) -> Self {
        Self { thread, serial }
    }
}

/// Equality key derived from a tag value.
///
/// Symbols and strings match by text, integers by value, objects by identity;
/// other plain data falls back to its inspect text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagKey {
    Name(Arc<str>),
    Int(i64),
    Identity(usize),
    Other(String),
}

impl TagKey {
    pub fn from_value(tag: &Value) -> Self {
        match tag {
            Value::Symbol(s) => TagKey::Name(Arc::from(s.as_str())),
            Value::Str(s) => TagKey::Name(Arc::from(s.as_str())),
            Value::Int(n) => TagKey::Int(*n),
            Value::Object(obj) => TagKey::Identity(Arc::as_ptr(obj) as *const () as usize),
            Value::Scope(scope) => TagKey::Identity(Arc::as_ptr(scope) as usize),
            Value::Error(err) => TagKey::Identity(Arc::as_ptr(err) as usize),
            other => TagKey::Other(other.inspect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Active,
    Matched,
    Completed,
}

/// A live target established by `catch`
#[derive(Debug, Clone)]
pub struct CapturePoint {
    id: CaptureId,
    tag: TagKey,
    state: CaptureState,
}

impl CapturePoint {
    pub fn id(&self) -> CaptureId {
        self.id
    }

    pub fn tag(&self) -> &TagKey {
        &self.tag
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }
}

/// The unwinding signal of a matched `throw`
#[derive(Debug, Clone)]
pub struct ThrowSignal {
    target: CaptureId,
    tag: Value,
    payload: Value,
}

impl ThrowSignal {
    pub fn target(&self) -> CaptureId {
        self.target
    }

    pub fn tag(&self) -> &Value {
        &self.tag
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn tag_text(&self) -> String {
        tag_text(&self.tag)
    }
}

/// Fresh tag object for `catch` without an explicit tag
#[derive(Debug)]
struct AnonymousTag;

impl HostObject for AnonymousTag {
    fn class_name(&self) -> &str {
        "Object"
    }

    fn inspect(&self) -> String {
        format!("#<Object:{:p}>", self as *const Self)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Active => "active",
            CaptureState::Matched => "matched",
            CaptureState::Completed => "completed",
        };
        f.write_str(name)
    }
}

impl ExecutionContext {
    /// Run `block` with a capture point for `tag` pushed.
    ///
    /// The point is popped exactly once whatever way the block exits: normal
    /// return, raise, cancellation, a throw aimed elsewhere, or a Rust panic
    /// (which is resumed after the pop).
    pub fn enter_catch<F>(&mut self, tag: Value, block: F) -> KResult<Value>
    where
        F: FnOnce(&mut ExecutionContext, &Value) -> KResult<Value>,
    {
        self.check_interrupts()?;

        let id = self.next_capture_id();
        let depth = self.catches.len();
        self.catches.push(CapturePoint {
            id,
            tag: TagKey::from_value(&tag),
            state: CaptureState::Active,
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| block(self, &tag)));

        debug_assert_eq!(self.catches.len(), depth + 1);
        self.catches.truncate(depth + 1);
        let state = match self.catches.pop() {
            Some(point) if point.id == id && point.state == CaptureState::Matched => {
                CaptureState::Matched
            }
            _ => CaptureState::Completed,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(panic_payload) => panic::resume_unwind(panic_payload),
        };

        match result {
            Err(Flow::Throw(signal)) if signal.target == id => {
                debug_assert_eq!(state, CaptureState::Matched);
                Ok(signal.payload)
            }
            other => other,
        }
    }

    /// `catch` without a tag: a fresh tag object is created and handed to the block
    pub fn enter_catch_anonymous<F>(&mut self, block: F) -> KResult<Value>
    where
        F: FnOnce(&mut ExecutionContext, &Value) -> KResult<Value>,
    {
        self.enter_catch(Value::object(AnonymousTag), block)
    }

    /// Transfer to the innermost active capture point whose tag equals `tag`.
    /// Never returns `Ok`. A missing payload delivers `nil`.
    pub fn perform_throw(&mut self, tag: &Value, payload: Option<Value>) -> KResult<Value> {
        let key = TagKey::from_value(tag);
        let matched = self
            .catches
            .iter_mut()
            .rev()
            .find(|point| point.state == CaptureState::Active && point.tag == key);

        if let Some(point) = matched {
            point.state = CaptureState::Matched;
            return Err(Flow::Throw(ThrowSignal {
                target: point.id,
                tag: tag.clone(),
                payload: payload.unwrap_or(Value::Nil),
            }));
        }

        let err = if self.is_primary() {
            ErrorObject::uncaught_tag(self.runtime().throw_compat(), tag)
        } else {
            ErrorObject::cross_thread_uncaught_tag(tag, self.thread_id())
        };
        Err(self.raise_prepared(err))
    }

    /// Active capture points, outermost first
    pub fn capture_points(&self) -> &[CapturePoint] {
        &self.catches
    }
}

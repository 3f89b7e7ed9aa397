//! Fallback dispatch for unresolved sends
//!
//! When ordinary dispatch cannot find a method, the evaluator reports the
//! failed send here. The five built-in fallback handlers form a closed set
//! keyed by (visibility, call type) and live in a table fixed at runtime
//! initialization. A user-level override, when installed in the runtime's
//! hook slot, is consulted before the table.
//!
//! Two entry forms normalize to the same [`UnresolvedCall`]:
//! - automatic: the evaluator passes the name out of band
//!   ([`ExecutionContext::dispatch_unresolved`])
//! - explicit: `method_missing(:name, *args)` called from user code
//!   ([`ExecutionContext::method_missing`]), where the leading argument is
//!   the name and must be stripped

use std::fmt;

use crate::context::ExecutionContext;
use crate::error::{ErrorObject, KResult, UnresolvedCallMessage};
use crate::value::{Symbol, Value};

/// Method visibility at the time lookup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// How a send reached the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Explicit receiver and name
    Normal,
    /// Bare identifier: a local binding or a zero-argument call
    Variable,
    /// Superclass re-dispatch
    Super,
}

/// The built-in fallback handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackHandler {
    PrivateNormal,
    ProtectedNormal,
    PublicVariable,
    PublicSuper,
    PublicNormal,
}

impl FallbackHandler {
    pub const ALL: [FallbackHandler; 5] = [
        FallbackHandler::PrivateNormal,
        FallbackHandler::ProtectedNormal,
        FallbackHandler::PublicVariable,
        FallbackHandler::PublicSuper,
        FallbackHandler::PublicNormal,
    ];

    /// Handler for a failed send made with the given markers
    pub fn select(visibility: Visibility, call_type: CallType) -> Self {
        match (visibility, call_type) {
            (Visibility::Private, _) => FallbackHandler::PrivateNormal,
            (Visibility::Protected, _) => FallbackHandler::ProtectedNormal,
            (Visibility::Public, CallType::Variable) => FallbackHandler::PublicVariable,
            (Visibility::Public, CallType::Super) => FallbackHandler::PublicSuper,
            (Visibility::Public, CallType::Normal) => FallbackHandler::PublicNormal,
        }
    }

    fn index(self) -> usize {
        match self {
            FallbackHandler::PrivateNormal => 0,
            FallbackHandler::ProtectedNormal => 1,
            FallbackHandler::PublicVariable => 2,
            FallbackHandler::PublicSuper => 3,
            FallbackHandler::PublicNormal => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FallbackHandler::PrivateNormal => "private_method_missing",
            FallbackHandler::ProtectedNormal => "protected_method_missing",
            FallbackHandler::PublicVariable => "variable_method_missing",
            FallbackHandler::PublicSuper => "super_method_missing",
            FallbackHandler::PublicNormal => "normal_method_missing",
        }
    }
}

/// What a built-in handler feeds into resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverParams {
    pub visibility: Visibility,
    pub call_type: CallType,
}

/// Immutable handler table, built once per runtime
#[derive(Debug)]
pub struct FallbackTable {
    entries: [ResolverParams; 5],
}

impl FallbackTable {
    pub fn builtin() -> Self {
        let params = |visibility, call_type| ResolverParams {
            visibility,
            call_type,
        };
        Self {
            entries: [
                params(Visibility::Private, CallType::Normal),
                params(Visibility::Protected, CallType::Normal),
                params(Visibility::Public, CallType::Variable),
                params(Visibility::Public, CallType::Super),
                params(Visibility::Public, CallType::Normal),
            ],
        }
    }

    pub fn params(&self, handler: FallbackHandler) -> ResolverParams {
        self.entries[handler.index()]
    }
}

/// Descriptor of one failed send; lives for a single resolution
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedCall {
    pub receiver: Value,
    pub name: Symbol,
    pub visibility: Visibility,
    pub call_type: CallType,
    pub args: Vec<Value>,
}

impl UnresolvedCall {
    /// Automatic form: name supplied out of band, arguments unstripped
    pub fn automatic(receiver: Value, name: Symbol, params: ResolverParams, args: Vec<Value>) -> Self {
        Self {
            receiver,
            name,
            visibility: params.visibility,
            call_type: params.call_type,
            args,
        }
    }

    /// Explicit form: `args[0]` is the missing name, the rest are the real
    /// call arguments. Returns `None` when there is no leading symbol.
    pub fn explicit(receiver: Value, args: &[Value], params: ResolverParams) -> Option<Self> {
        let (first, rest) = args.split_first()?;
        let Value::Symbol(name) = first else {
            return None;
        };
        Some(Self {
            receiver,
            name: name.clone(),
            visibility: params.visibility,
            call_type: params.call_type,
            args: rest.to_vec(),
        })
    }
}

/// User-level replacement for the default fallback handler.
///
/// The hook may resolve the send by returning a value, or raise. Calling
/// [`resolve_unresolved_call`] from the hook gives the default behavior.
pub trait FallbackHook: Send + Sync + fmt::Debug {
    fn call(&self, ctx: &mut ExecutionContext, call: &UnresolvedCall) -> KResult<Value>;
}

/// Build the error for an unresolved send and raise it. Never returns `Ok`.
pub fn resolve_unresolved_call(ctx: &mut ExecutionContext, call: UnresolvedCall) -> KResult<Value> {
    let UnresolvedCall {
        receiver,
        name,
        visibility,
        call_type,
        args,
    } = call;
    let message = UnresolvedCallMessage::new(receiver, name.clone(), visibility, call_type);
    let err = match call_type {
        // A bare identifier has no call arguments to report
        CallType::Variable => ErrorObject::unresolved_name(message, name),
        CallType::Normal | CallType::Super => ErrorObject::unresolved_method(message, name, args),
    };
    Err(ctx.raise_prepared(err))
}

impl ExecutionContext {
    fn current_fallback_params(&self) -> ResolverParams {
        let handler = FallbackHandler::select(self.last_visibility(), self.last_call_type());
        self.runtime().fallback_table().params(handler)
    }

    /// Automatic entry, invoked by the evaluator after a failed lookup.
    /// Uses the markers set by [`ExecutionContext::mark_failed_send`].
    pub fn dispatch_unresolved(&mut self, receiver: Value, name: Symbol, args: Vec<Value>) -> KResult<Value> {
        let params = self.current_fallback_params();
        let call = UnresolvedCall::automatic(receiver, name, params, args);
        match self.runtime().fallback_hook() {
            Some(hook) => hook.call(self, &call),
            None => resolve_unresolved_call(self, call),
        }
    }

    /// Explicit entry: the default `method_missing(name, *args)`.
    pub fn method_missing(&mut self, receiver: Value, args: &[Value]) -> KResult<Value> {
        let params = self.current_fallback_params();
        match UnresolvedCall::explicit(receiver, args, params) {
            Some(call) => resolve_unresolved_call(self, call),
            None => Err(self.raise_prepared(ErrorObject::argument_error("no id given"))),
        }
    }
}

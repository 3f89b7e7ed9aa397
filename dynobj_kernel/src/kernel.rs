//! Language-level entry points
//!
//! The evaluator dispatches calls to `catch`, `throw`, `autoload`,
//! `autoload?`, `raise`, `fail` and `method_missing` through [`invoke`], which
//! checks arity and forwards to the context operations.

use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::{ErrorClass, ErrorObject, KResult};
use crate::scope::ScopeRef;
use crate::value::Value;

/// Block passed to a builtin (`catch` is the only one that takes one)
pub type Block<'a> = &'a mut dyn FnMut(&mut ExecutionContext, &[Value]) -> KResult<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelBuiltin {
    Catch,
    Throw,
    Autoload,
    AutoloadP,
    Raise,
    Fail,
    MethodMissing,
}

impl KernelBuiltin {
    pub const ALL: [KernelBuiltin; 7] = [
        KernelBuiltin::Catch,
        KernelBuiltin::Throw,
        KernelBuiltin::Autoload,
        KernelBuiltin::AutoloadP,
        KernelBuiltin::Raise,
        KernelBuiltin::Fail,
        KernelBuiltin::MethodMissing,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "catch" => Some(Self::Catch),
            "throw" => Some(Self::Throw),
            "autoload" => Some(Self::Autoload),
            "autoload?" => Some(Self::AutoloadP),
            "raise" => Some(Self::Raise),
            "fail" => Some(Self::Fail),
            "method_missing" => Some(Self::MethodMissing),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Catch => "catch",
            Self::Throw => "throw",
            Self::Autoload => "autoload",
            Self::AutoloadP => "autoload?",
            Self::Raise => "raise",
            Self::Fail => "fail",
            Self::MethodMissing => "method_missing",
        }
    }
}

/// Accepted argument counts, `None` where the operation checks for itself
fn arity(builtin: KernelBuiltin) -> Option<(usize, usize, &'static str)> {
    match builtin {
        KernelBuiltin::Catch => Some((0, 1, "0..1")),
        KernelBuiltin::Throw => Some((1, 2, "1..2")),
        KernelBuiltin::Autoload => Some((2, 2, "2")),
        KernelBuiltin::AutoloadP => Some((1, 1, "1")),
        KernelBuiltin::Raise | KernelBuiltin::Fail | KernelBuiltin::MethodMissing => None,
    }
}

/// Owning scope for `autoload`/`autoload?`: the receiver when it is a scope,
/// else the top-level `Object` scope.
fn autoload_scope(ctx: &ExecutionContext, receiver: &Value) -> ScopeRef {
    match receiver {
        Value::Scope(scope) => scope.clone(),
        _ => ctx.runtime().object_scope().clone(),
    }
}

/// Call `builtin` on `receiver` with `args`
pub fn invoke(
    ctx: &mut ExecutionContext,
    builtin: KernelBuiltin,
    receiver: &Value,
    args: &[Value],
    block: Option<Block<'_>>,
) -> KResult<Value> {
    if let Some((min, max, expected)) = arity(builtin) {
        if args.len() < min || args.len() > max {
            return Err(ctx.raise_prepared(ErrorObject::wrong_arity(args.len(), expected)));
        }
    }

    match builtin {
        KernelBuiltin::Catch => {
            let Some(block) = block else {
                return Err(ctx.raise_prepared(ErrorObject::new(
                    ErrorClass::LocalJumpError,
                    "no block given",
                )));
            };
            let run = |ctx: &mut ExecutionContext, tag: &Value| block(ctx, std::slice::from_ref(tag));
            match args.first() {
                Some(tag) => ctx.enter_catch(tag.clone(), run),
                None => ctx.enter_catch_anonymous(run),
            }
        }
        KernelBuiltin::Throw => ctx.perform_throw(&args[0], args.get(1).cloned()),
        KernelBuiltin::Autoload => {
            let scope = autoload_scope(ctx, receiver);
            ctx.autoload(&scope, &args[0], &args[1])
        }
        KernelBuiltin::AutoloadP => {
            let scope = autoload_scope(ctx, receiver);
            ctx.autoload_p(&scope, &args[0])
        }
        KernelBuiltin::Raise => ctx.raise(args),
        KernelBuiltin::Fail => ctx.fail(args),
        KernelBuiltin::MethodMissing => ctx.method_missing(receiver.clone(), args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    #[test]
    fn test_names_round_trip() {
        for builtin in KernelBuiltin::ALL {
            assert_eq!(KernelBuiltin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(KernelBuiltin::from_name("exit"), None);
    }

    #[test]
    fn test_catch_requires_block() {
        let runtime = Runtime::builder().build();
        let mut ctx = runtime.thread_context();
        let err = invoke(&mut ctx, KernelBuiltin::Catch, &Value::Nil, &[Value::sym("t")], None)
            .unwrap_err()
            .into_error()
            .unwrap();
        assert_eq!(err.class(), &ErrorClass::LocalJumpError);
        assert_eq!(ctx.capture_depth(), 0);
    }

    #[test]
    fn test_arity_errors() {
        let runtime = Runtime::builder().build();
        let mut ctx = runtime.thread_context();
        let err = invoke(&mut ctx, KernelBuiltin::Throw, &Value::Nil, &[], None)
            .unwrap_err()
            .into_error()
            .unwrap();
        assert_eq!(err.message_text(), "wrong number of arguments (0 for 1..2)");

        let err = invoke(&mut ctx, KernelBuiltin::Autoload, &Value::Nil, &[Value::sym("Foo")], None)
            .unwrap_err()
            .into_error()
            .unwrap();
        assert_eq!(err.message_text(), "wrong number of arguments (1 for 2)");
    }

    #[test]
    fn test_catch_and_throw_through_invoke() {
        let runtime = Runtime::builder().build();
        let mut ctx = runtime.thread_context();
        let block: Block<'_> = &mut |ctx, args| {
            assert_eq!(args, &[Value::sym("done")]);
            invoke(ctx, KernelBuiltin::Throw, &Value::Nil, &[Value::sym("done"), Value::Int(5)], None)
        };
        let result = invoke(
            &mut ctx,
            KernelBuiltin::Catch,
            &Value::Nil,
            &[Value::sym("done")],
            Some(block),
        );
        assert_eq!(result.unwrap(), Value::Int(5));
    }

    #[test]
    fn test_autoload_uses_receiver_scope() {
        let runtime = Runtime::builder().build();
        let mut ctx = runtime.thread_context();
        let outer = runtime.object_scope().define_scope("Outer");
        let receiver = Value::Scope(outer.clone());
        invoke(
            &mut ctx,
            KernelBuiltin::Autoload,
            &receiver,
            &[Value::sym("Foo"), Value::str("outer/foo")],
            None,
        )
        .unwrap();
        assert_eq!(
            invoke(&mut ctx, KernelBuiltin::AutoloadP, &receiver, &[Value::sym("Foo")], None).unwrap(),
            Value::str("outer/foo")
        );
        assert_eq!(
            invoke(&mut ctx, KernelBuiltin::AutoloadP, &Value::Nil, &[Value::sym("Foo")], None).unwrap(),
            Value::Nil
        );
    }
}

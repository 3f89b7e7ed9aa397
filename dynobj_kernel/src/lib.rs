//! Dynamic object runtime kernel
//!
//! The fallback-resolution and control-transfer core of a dynamic object
//! runtime. It includes:
//!
//! - the resolver for unresolved sends (`method_missing`) and `raise`/`fail`
//! - tagged non-local exit (`catch`/`throw`) over a per-thread capture stack
//! - lazy constant binding (`autoload`) through a load-once collaborator
//!
//! The object model and the evaluator live outside this crate. The evaluator
//! drives the kernel through an [`ExecutionContext`] per thread, created from
//! a shared [`Runtime`].

#![deny(clippy::print_stderr)]

pub mod autoload;
pub mod cancel;
pub mod catch;
pub mod config;
pub mod context;
pub mod convert;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod loader;
mod raise;
pub mod runtime;
pub mod scope;
pub mod thread;
pub mod value;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use dynobj_kernel::prelude::*;
///
/// let runtime = Runtime::new(RuntimeConfig::default());
/// let mut ctx = runtime.main_context().unwrap();
/// let result = ctx.enter_catch(Value::sym("done"), |ctx, _| {
///     ctx.perform_throw(&Value::sym("done"), Some(Value::Int(42)))
/// });
/// assert_eq!(result.unwrap(), Value::Int(42));
/// ```
pub mod prelude {
    pub use super::config::{RuntimeConfig, ThrowCompat};
    pub use super::context::{ExecutionContext, Frame};
    pub use super::dispatch::{CallType, FallbackHook, UnresolvedCall, Visibility};
    pub use super::error::{ErrorClass, ErrorObject, ErrorRef, Flow, KResult};
    pub use super::kernel::{invoke, KernelBuiltin};
    pub use super::loader::{FeatureLoader, LoadOnce};
    pub use super::runtime::Runtime;
    pub use super::scope::{Scope, ScopeRef};
    pub use super::value::{HostObject, Symbol, Value};
}

pub use prelude::*;

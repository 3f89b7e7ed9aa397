//! The `raise` primitive
//!
//! Argument shapes:
//! - `raise` re-raises the thread's last error, or a RuntimeError with an
//!   empty message when there is none
//! - `raise "text"` raises a RuntimeError
//! - `raise obj [, message [, backtrace]]` converts `obj` through its
//!   `exception` capability (see [`crate::convert`])
//!
//! Every error leaving the kernel goes through [`ExecutionContext::raise_ref`],
//! which fixes its backtrace once and records it as the last error.

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::convert::{backtrace_override, convert_to_exception};
use crate::error::{ErrorObject, ErrorRef, Flow, KResult};
use crate::value::Value;

/// Location used by the debug summary when the backtrace is empty
const UNKNOWN_LOCATION: &str = "(unknown):0";

impl ExecutionContext {
    /// `raise(*args)`. Never returns `Ok`.
    pub fn raise(&mut self, args: &[Value]) -> KResult<Value> {
        let err = match self.exception_from_args(args) {
            Ok(err) => err,
            Err(flow) => return Err(self.propagate(flow)),
        };
        let flow = self.raise_ref(Arc::clone(&err));
        if self.runtime().debug() {
            self.emit_raise_summary(&err);
        }
        Err(flow)
    }

    /// Alias of [`ExecutionContext::raise`]
    pub fn fail(&mut self, args: &[Value]) -> KResult<Value> {
        self.raise(args)
    }

    fn exception_from_args(&self, args: &[Value]) -> KResult<ErrorRef> {
        match args {
            [] => Ok(self
                .last_error()
                .cloned()
                .unwrap_or_else(|| Arc::new(ErrorObject::generic_runtime("")))),
            [Value::Str(text)] => Ok(Arc::new(ErrorObject::generic_runtime(text))),
            [obj] => convert_to_exception(obj, None),
            [obj, message] => convert_to_exception(obj, Some(message)),
            [obj, message, backtrace] => {
                let lines = backtrace_override(backtrace)?;
                let err = convert_to_exception(obj, Some(message))?;
                if let Some(lines) = lines {
                    err.finalize_backtrace(lines);
                }
                Ok(err)
            }
            _ => Err(ErrorObject::wrong_arity(args.len(), "0..3").into()),
        }
    }

    /// Raise a freshly built kernel error
    pub(crate) fn raise_prepared(&mut self, err: ErrorObject) -> Flow {
        self.raise_ref(Arc::new(err))
    }

    /// Raise `err` as is. The backtrace is captured from the current frames
    /// unless the error already carries one.
    pub fn raise_ref(&mut self, err: ErrorRef) -> Flow {
        err.finalize_backtrace(self.capture_backtrace());
        self.set_last_error(Arc::clone(&err));
        Flow::Raise(err)
    }

    /// Prepare a raise that was produced without a context (conversion
    /// failures, host capabilities). Other flows pass through.
    pub(crate) fn propagate(&mut self, flow: Flow) -> Flow {
        match flow {
            Flow::Raise(err) => self.raise_ref(err),
            other => other,
        }
    }

    fn emit_raise_summary(&self, err: &ErrorObject) {
        let location = err
            .backtrace()
            .and_then(|lines| lines.first())
            .map(|line| match line.split_once(":in `") {
                Some((location, _)) => location,
                None => line.as_str(),
            })
            .unwrap_or(UNKNOWN_LOCATION);
        let line = format!(
            "Exception `{}' at {} - {}",
            err.class(),
            location,
            err.message_text()
        );
        self.runtime().diagnostics().emit(&line);
    }
}

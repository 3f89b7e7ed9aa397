//! Conversion to error objects (the `exception` capability)
//!
//! `raise` accepts anything that can turn itself into an error: error classes
//! instantiate themselves, error instances return themselves (or a copy with a
//! new message), and host objects answer through [`HostObject::to_exception`].
//!
//! [`HostObject::to_exception`]: crate::value::HostObject::to_exception

use std::sync::Arc;

use crate::error::{ErrorObject, ErrorRef, Flow, KResult};
use crate::value::Value;

/// Convert `value` to an error object, passing `message` to its capability.
///
/// Errors created here are not yet raised; the caller prepares them.
pub fn convert_to_exception(value: &Value, message: Option<&Value>) -> KResult<ErrorRef> {
    match value {
        Value::ErrorClass(class) => {
            Ok(Arc::new(class.new_instance(message.map(Value::to_text))))
        }
        Value::Error(err) => match message {
            None => Ok(Arc::clone(err)),
            Some(message) => Ok(Arc::new(err.exception_with_message(message.to_text()))),
        },
        Value::Object(obj) => match obj.to_exception(message) {
            None => Err(ErrorObject::raise_type_mismatch("exception class/object expected").into()),
            Some(Ok(Value::Error(err))) => Ok(err),
            Some(Ok(_)) => Err(ErrorObject::raise_type_mismatch("exception object expected").into()),
            Some(Err(flow)) => Err(flow),
        },
        _ => Err(ErrorObject::raise_type_mismatch("exception class/object expected").into()),
    }
}

/// Backtrace override accepted as the third argument of `raise`.
/// `nil` means "no override".
pub fn backtrace_override(value: &Value) -> KResult<Option<Vec<String>>> {
    match value {
        Value::Nil => Ok(None),
        Value::Str(line) => Ok(Some(vec![line.clone()])),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Str(line) => Ok(line.clone()),
                _ => Err(backtrace_type_error()),
            })
            .collect::<Result<Vec<_>, Flow>>()
            .map(Some),
        _ => Err(backtrace_type_error()),
    }
}

fn backtrace_type_error() -> Flow {
    ErrorObject::type_error("backtrace must be Array of String").into()
}

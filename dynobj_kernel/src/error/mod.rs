//! Error objects and control flow
//!
//! Every kernel operation returns `KResult<T>`. The error side is a [`Flow`]:
//! either a raised language error, a catch/throw transfer in progress, or an
//! external cancellation. Language errors are immutable [`ErrorObject`]s shared
//! through `Arc`, so a re-raise hands out the very same object.

mod message;

pub use message::{describe_receiver, ErrorMessage, UnresolvedCallMessage};

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::catch::ThrowSignal;
use crate::config::ThrowCompat;
use crate::thread::ThreadId;
use crate::value::{Symbol, Value};

/// Shared handle to a raised (or raisable) error object
pub type ErrorRef = Arc<ErrorObject>;

/// Result type alias for kernel operations
pub type KResult<T> = Result<T, Flow>;

/// Non-local control flow travelling up the Rust call stack.
#[derive(Debug, Clone, Error)]
pub enum Flow {
    /// A language-level error is propagating
    #[error("{0}")]
    Raise(ErrorRef),

    /// A `throw` is unwinding towards the capture point it already matched
    #[error("throw of `{}' in progress", .0.tag_text())]
    Throw(ThrowSignal),

    /// External cancellation request
    #[error("Execution cancelled")]
    Cancelled,
}

impl Flow {
    /// The raised error, if this flow is a raise
    pub fn as_error(&self) -> Option<&ErrorRef> {
        match self {
            Flow::Raise(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_error(self) -> Option<ErrorRef> {
        match self {
            Flow::Raise(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ErrorObject> for Flow {
    fn from(err: ErrorObject) -> Self {
        Flow::Raise(Arc::new(err))
    }
}

/// A user-defined error class
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CustomErrorClass {
    name: String,
    superclass: ErrorClass,
}

/// Error classes known to the kernel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    StandardError,
    RuntimeError,
    ArgumentError,
    TypeError,
    NameError,
    NoMethodError,
    ThreadError,
    LoadError,
    LocalJumpError,
    Custom(Arc<CustomErrorClass>),
}

impl ErrorClass {
    pub fn custom(name: &str, superclass: ErrorClass) -> Self {
        ErrorClass::Custom(Arc::new(CustomErrorClass {
            name: name.to_string(),
            superclass,
        }))
    }

    pub fn name(&self) -> &str {
        match self {
            ErrorClass::StandardError => "StandardError",
            ErrorClass::RuntimeError => "RuntimeError",
            ErrorClass::ArgumentError => "ArgumentError",
            ErrorClass::TypeError => "TypeError",
            ErrorClass::NameError => "NameError",
            ErrorClass::NoMethodError => "NoMethodError",
            ErrorClass::ThreadError => "ThreadError",
            ErrorClass::LoadError => "LoadError",
            ErrorClass::LocalJumpError => "LocalJumpError",
            ErrorClass::Custom(custom) => &custom.name,
        }
    }

    pub fn superclass(&self) -> Option<ErrorClass> {
        match self {
            ErrorClass::StandardError => None,
            ErrorClass::NoMethodError => Some(ErrorClass::NameError),
            ErrorClass::Custom(custom) => Some(custom.superclass.clone()),
            _ => Some(ErrorClass::StandardError),
        }
    }

    /// Whether this class is `other` or one of its descendants
    pub fn is_a(&self, other: &ErrorClass) -> bool {
        let mut current = Some(self.clone());
        while let Some(class) = current {
            if &class == other {
                return true;
            }
            current = class.superclass();
        }
        false
    }

    /// Instantiate, as the `exception` capability of a class does.
    /// Without a message the message is the class name.
    pub fn new_instance(&self, message: Option<String>) -> ErrorObject {
        let text = message.unwrap_or_else(|| self.name().to_string());
        ErrorObject::new(self.clone(), text)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which member of the kernel's error taxonomy produced an error object
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// Created by user code or a conversion capability
    Raised,
    UnresolvedMethod,
    UnresolvedName,
    UncaughtTag { tag: Value },
    CrossThreadUncaughtTag { tag: Value, thread: ThreadId },
    AutoloadNameFormat,
    AutoloadEmptySource,
    RaiseTypeMismatch,
    GenericRuntime,
    UninitializedConstant,
    MissingFeature,
    Arity,
}

/// A language-level error instance
#[derive(Debug)]
pub struct ErrorObject {
    class: ErrorClass,
    message: ErrorMessage,
    name: Option<Symbol>,
    args: Option<Vec<Value>>,
    detail: ErrorDetail,
    backtrace: OnceLock<Vec<String>>,
}

impl ErrorObject {
    pub fn new(class: ErrorClass, message: impl Into<ErrorMessage>) -> Self {
        Self {
            class,
            message: message.into(),
            name: None,
            args: None,
            detail: ErrorDetail::Raised,
            backtrace: OnceLock::new(),
        }
    }

    pub fn with_name(mut self, name: Symbol) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_detail(mut self, detail: ErrorDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Copy of this error carrying a different message, as `exception(msg)`
    /// does on an instance. The copy has no backtrace yet.
    pub fn exception_with_message(&self, message: String) -> Self {
        Self {
            class: self.class.clone(),
            message: ErrorMessage::Text(message),
            name: self.name.clone(),
            args: self.args.clone(),
            detail: self.detail.clone(),
            backtrace: OnceLock::new(),
        }
    }

    pub fn class(&self) -> &ErrorClass {
        &self.class
    }

    pub fn message(&self) -> &ErrorMessage {
        &self.message
    }

    /// Rendered message text. Renders a deferred message on first use.
    pub fn message_text(&self) -> String {
        self.message.render().to_string()
    }

    pub fn name(&self) -> Option<&Symbol> {
        self.name.as_ref()
    }

    pub fn args(&self) -> Option<&[Value]> {
        self.args.as_deref()
    }

    pub fn detail(&self) -> &ErrorDetail {
        &self.detail
    }

    pub fn is_a(&self, class: &ErrorClass) -> bool {
        self.class.is_a(class)
    }

    pub fn backtrace(&self) -> Option<&[String]> {
        self.backtrace.get().map(Vec::as_slice)
    }

    /// Fix the backtrace. Only the first call has an effect; returns whether
    /// this call was the one that set it.
    pub fn finalize_backtrace(&self, frames: Vec<String>) -> bool {
        self.backtrace.set(frames).is_ok()
    }

    // ===== Taxonomy constructors =====

    pub fn unresolved_method(message: UnresolvedCallMessage, name: Symbol, args: Vec<Value>) -> Self {
        Self::new(ErrorClass::NoMethodError, message)
            .with_name(name)
            .with_args(args)
            .with_detail(ErrorDetail::UnresolvedMethod)
    }

    pub fn unresolved_name(message: UnresolvedCallMessage, name: Symbol) -> Self {
        Self::new(ErrorClass::NameError, message)
            .with_name(name)
            .with_detail(ErrorDetail::UnresolvedName)
    }

    pub fn uncaught_tag(mode: ThrowCompat, tag: &Value) -> Self {
        let text = tag_text(tag);
        let message = format!("uncaught throw `{}'", text);
        let detail = ErrorDetail::UncaughtTag { tag: tag.clone() };
        match mode {
            ThrowCompat::NameError => Self::new(ErrorClass::NameError, message)
                .with_name(Symbol::new(&text))
                .with_detail(detail),
            ThrowCompat::ArgumentError => {
                Self::new(ErrorClass::ArgumentError, message).with_detail(detail)
            }
        }
    }

    pub fn cross_thread_uncaught_tag(tag: &Value, thread: ThreadId) -> Self {
        let message = format!("uncaught throw `{}' in thread {}", tag_text(tag), thread);
        Self::new(ErrorClass::ThreadError, message).with_detail(
            ErrorDetail::CrossThreadUncaughtTag {
                tag: tag.clone(),
                thread,
            },
        )
    }

    pub fn autoload_name_format(name: &str) -> Self {
        Self::new(ErrorClass::NameError, "autoload must be constant name")
            .with_name(Symbol::new(name))
            .with_detail(ErrorDetail::AutoloadNameFormat)
    }

    pub fn autoload_empty_source() -> Self {
        Self::new(ErrorClass::ArgumentError, "empty file name")
            .with_detail(ErrorDetail::AutoloadEmptySource)
    }

    pub fn raise_type_mismatch(message: &str) -> Self {
        Self::new(ErrorClass::TypeError, message).with_detail(ErrorDetail::RaiseTypeMismatch)
    }

    pub fn generic_runtime(message: &str) -> Self {
        Self::new(ErrorClass::RuntimeError, message).with_detail(ErrorDetail::GenericRuntime)
    }

    pub fn uninitialized_constant(qualified_name: &str, name: &str) -> Self {
        Self::new(
            ErrorClass::NameError,
            format!("uninitialized constant {}", qualified_name),
        )
        .with_name(Symbol::new(name))
        .with_detail(ErrorDetail::UninitializedConstant)
    }

    pub fn missing_feature(source: &str) -> Self {
        Self::new(
            ErrorClass::LoadError,
            format!("no such file to load -- {}", source),
        )
        .with_detail(ErrorDetail::MissingFeature)
    }

    pub fn wrong_arity(given: usize, expected: &str) -> Self {
        Self::new(
            ErrorClass::ArgumentError,
            format!("wrong number of arguments ({} for {})", given, expected),
        )
        .with_detail(ErrorDetail::Arity)
    }

    pub fn argument_error(message: &str) -> Self {
        Self::new(ErrorClass::ArgumentError, message)
    }

    pub fn type_error(message: &str) -> Self {
        Self::new(ErrorClass::TypeError, message)
    }

    pub fn thread_error(message: &str) -> Self {
        Self::new(ErrorClass::ThreadError, message)
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.message.render();
        if text.is_empty() {
            write!(f, "{}", self.class)
        } else {
            write!(f, "{}: {}", self.class, text)
        }
    }
}

/// How a tag appears inside uncaught-throw messages
pub(crate) fn tag_text(tag: &Value) -> String {
    match tag.as_name() {
        Some(name) => name.to_string(),
        None => tag.inspect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ErrorObject::type_error("exception class/object expected");
        assert_eq!(
            format!("{}", err),
            "TypeError: exception class/object expected"
        );

        let err = ErrorObject::generic_runtime("");
        assert_eq!(format!("{}", err), "RuntimeError");
    }

    #[test]
    fn test_class_hierarchy() {
        assert!(ErrorClass::NoMethodError.is_a(&ErrorClass::NameError));
        assert!(ErrorClass::NoMethodError.is_a(&ErrorClass::StandardError));
        assert!(!ErrorClass::NameError.is_a(&ErrorClass::NoMethodError));
        assert!(!ErrorClass::TypeError.is_a(&ErrorClass::ArgumentError));

        let custom = ErrorClass::custom("AppError", ErrorClass::RuntimeError);
        assert!(custom.is_a(&ErrorClass::RuntimeError));
        assert!(custom.is_a(&ErrorClass::StandardError));
        assert_eq!(custom.name(), "AppError");
    }

    #[test]
    fn test_new_instance_defaults_message_to_class_name() {
        let err = ErrorClass::ArgumentError.new_instance(None);
        assert_eq!(err.message_text(), "ArgumentError");
        let err = ErrorClass::ArgumentError.new_instance(Some("bad".to_string()));
        assert_eq!(err.message_text(), "bad");
    }

    #[test]
    fn test_backtrace_is_set_once() {
        let err = ErrorObject::generic_runtime("boom");
        assert!(err.backtrace().is_none());
        assert!(err.finalize_backtrace(vec!["a.rb:1:in `x'".to_string()]));
        assert!(!err.finalize_backtrace(vec!["b.rb:2:in `y'".to_string()]));
        assert_eq!(err.backtrace(), Some(&["a.rb:1:in `x'".to_string()][..]));
    }

    #[test]
    fn test_uncaught_tag_shapes() {
        let tag = Value::sym("nope");
        let err = ErrorObject::uncaught_tag(ThrowCompat::NameError, &tag);
        assert_eq!(err.class(), &ErrorClass::NameError);
        assert_eq!(err.name().map(Symbol::as_str), Some("nope"));
        assert_eq!(err.message_text(), "uncaught throw `nope'");

        let err = ErrorObject::uncaught_tag(ThrowCompat::ArgumentError, &tag);
        assert_eq!(err.class(), &ErrorClass::ArgumentError);
        assert!(err.name().is_none());
    }

    #[test]
    fn test_exception_with_message_copies_fields() {
        let original = ErrorObject::argument_error("first");
        original.finalize_backtrace(vec!["x".to_string()]);
        let copy = original.exception_with_message("second".to_string());
        assert_eq!(copy.class(), &ErrorClass::ArgumentError);
        assert_eq!(copy.message_text(), "second");
        assert!(copy.backtrace().is_none());
    }
}

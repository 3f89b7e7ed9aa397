//! Error messages, including the deferred unresolved-call message.
//!
//! Most unresolved-call errors are rescued and discarded without ever being
//! printed, so their text is rendered on first inspection and cached.

use std::sync::{Arc, OnceLock};

use crate::dispatch::{CallType, Visibility};
use crate::value::{Symbol, Value};

/// Inspect strings longer than this are replaced by `#<Class>` in messages.
const MAX_INSPECT_IN_MESSAGE: usize = 65;

#[derive(Debug, Clone)]
pub enum ErrorMessage {
    Text(String),
    UnresolvedCall(Arc<UnresolvedCallMessage>),
}

impl ErrorMessage {
    pub fn render(&self) -> &str {
        match self {
            ErrorMessage::Text(text) => text,
            ErrorMessage::UnresolvedCall(msg) => msg.render(),
        }
    }

    /// Whether the text exists yet. Plain text always does.
    pub fn is_rendered(&self) -> bool {
        match self {
            ErrorMessage::Text(_) => true,
            ErrorMessage::UnresolvedCall(msg) => msg.is_rendered(),
        }
    }
}

impl From<String> for ErrorMessage {
    fn from(text: String) -> Self {
        ErrorMessage::Text(text)
    }
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        ErrorMessage::Text(text.to_string())
    }
}

impl From<UnresolvedCallMessage> for ErrorMessage {
    fn from(msg: UnresolvedCallMessage) -> Self {
        ErrorMessage::UnresolvedCall(Arc::new(msg))
    }
}

/// Message thunk for a failed send.
#[derive(Debug)]
pub struct UnresolvedCallMessage {
    receiver: Value,
    name: Symbol,
    visibility: Visibility,
    call_type: CallType,
    rendered: OnceLock<String>,
}

impl UnresolvedCallMessage {
    pub fn new(receiver: Value, name: Symbol, visibility: Visibility, call_type: CallType) -> Self {
        Self {
            receiver,
            name,
            visibility,
            call_type,
            rendered: OnceLock::new(),
        }
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered.get().is_some()
    }

    pub fn render(&self) -> &str {
        self.rendered.get_or_init(|| {
            let desc = describe_receiver(&self.receiver);
            let name = &self.name;
            match (self.visibility, self.call_type) {
                (Visibility::Private, _) => {
                    format!("private method `{}' called for {}", name, desc)
                }
                (Visibility::Protected, _) => {
                    format!("protected method `{}' called for {}", name, desc)
                }
                (Visibility::Public, CallType::Variable) => {
                    format!("undefined local variable or method `{}' for {}", name, desc)
                }
                (Visibility::Public, CallType::Super) => {
                    format!("super: no superclass method `{}' for {}", name, desc)
                }
                (Visibility::Public, CallType::Normal) => {
                    format!("undefined method `{}' for {}", name, desc)
                }
            }
        })
    }
}

/// Descriptive receiver text used in unresolved-call messages
pub fn describe_receiver(receiver: &Value) -> String {
    match receiver {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            let inspect = receiver.inspect();
            if inspect.chars().count() > MAX_INSPECT_IN_MESSAGE {
                format!("#<{}>", receiver.class_name())
            } else {
                format!("{}:{}", inspect, receiver.class_name())
            }
        }
    }
}

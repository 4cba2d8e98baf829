//! Error descriptions recorded on log entries and spans.

use std::any::Any;
use std::error::Error;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

/// Structured description of an error: `{name, message, stack?}`.
///
/// `stack` holds the `source()` chain, one cause per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Describe any error value. The name is the short type name of `E`.
    pub fn from_error<E: Error + ?Sized>(err: &E) -> Self {
        let mut stack = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            if !stack.is_empty() {
                stack.push('\n');
            }
            let _ = write!(stack, "caused by: {}", cause);
            source = cause.source();
        }

        Self {
            name: short_type_name(std::any::type_name::<E>()),
            message: err.to_string(),
            stack: (!stack.is_empty()).then_some(stack),
        }
    }

    /// Describe a value that only implements `Display`, such as
    /// `Box<dyn Error>`. No cause chain is available.
    pub fn from_display<E: fmt::Display + ?Sized>(err: &E) -> Self {
        Self::new(short_type_name(std::any::type_name::<E>()), err.to_string())
    }

    /// Describe a panic payload caught by `catch_unwind`.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Self::new("panic", message)
    }
}

fn short_type_name(full: &str) -> String {
    let full = full.trim_start_matches('&');
    if let Some(inner) = full
        .strip_prefix("alloc::boxed::Box<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return short_type_name(inner);
    }
    if full.starts_with("dyn ") {
        return "Error".to_string();
    }
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

//! Error types shared across the crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A class that inherits store behaviour was instantiated without being
    /// decorated itself.
    #[error("Class {class} isn't decorated as a store")]
    Undecorated { class: String },

    #[error("cannot assign to read-only property `{key}`")]
    ReadOnly { key: String },

    #[error("cannot modify property `{key}` of a frozen object")]
    Frozen { key: String },

    #[error("cannot redefine non-configurable property `{key}`")]
    NotConfigurable { key: String },

    #[error("property `{key}` is not a function")]
    NotCallable { key: String },

    #[error("computed value has no setter")]
    ReadOnlyComputed,

    #[error("{message}")]
    Callback { message: String },
}

impl StoreError {
    /// Build an error raised from user code (methods, setters, callbacks).
    #[must_use]
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            message: message.into(),
        }
    }

    /// Whether this error signals a misconfigured class hierarchy.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Undecorated { .. })
    }
}

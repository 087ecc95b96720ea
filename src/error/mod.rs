//! The unified error handling system for the SDK.

// 1. Core Types
pub use types::ObserverError;

/// A unified `Result` type for the entire crate.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, ObserverError>;

// 3. Module declarations
pub mod macros;
pub mod types;

// 4. Context Trait for adding context to errors.
pub trait Context<T, E> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<ObserverError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => {
                let context_message = context().to_string();
                Err(ObserverError::Context {
                    context: context_message,
                    source: Box::new(error.into()),
                })
            }
        }
    }
}

// 5. Error Category for deciding between hard failure and degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the caller (e.g., bad configuration, invalid credentials).
    /// These must surface immediately instead of being swallowed.
    Client,
    /// Errors caused by collaborators or the environment.
    /// The SDK degrades gracefully when it meets one of these.
    Server,
}

//! 运行时错误类型
//!
//! All fallible operations in the crate return [`Result`] with a
//! [`RuntimeError`] value. Nothing in the library panics on user error;
//! panics inside user closures are caught at the region boundary and
//! re-raised on the forking thread.

use thiserror::Error;

/// Errors produced by the parallel runtime
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A region-scoped primitive was used with no live parallel region
    #[error("operation requires an active parallel region")]
    NotInParallelRegion,

    /// A parallel region was opened from inside another parallel region
    #[error("parallel regions cannot be nested")]
    NestedParallelism,

    /// A worksharing construct was entered while another one was active
    #[error("worksharing constructs cannot be nested: {context}")]
    NestedWorksharing { context: String },

    /// Caller-supplied arguments are out of range or inconsistent
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// A scheduler violated its own bookkeeping, e.g. cursor overflow
    #[error("internal scheduler error: {message}")]
    InternalScheduler { message: String },

    /// `ordered` was called in a region with no active worksharing loop
    #[error("ordered sections require an active worksharing loop")]
    OrderedOutsideLoop,

    /// A peer worker in the same region failed first
    #[error("parallel region poisoned by a failing worker")]
    RegionPoisoned,

    /// The feature is recognized but deliberately unsupported
    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },
}

impl RuntimeError {
    /// Shorthand for [`RuntimeError::InvalidArguments`]
    pub fn invalid_args(message: impl Into<String>) -> Self {
        RuntimeError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Shorthand for [`RuntimeError::InternalScheduler`]
    pub fn internal(message: impl Into<String>) -> Self {
        RuntimeError::InternalScheduler {
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RuntimeError>;

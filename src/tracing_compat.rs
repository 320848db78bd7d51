//! Logging macros that work with or without the `tracing` crate.
//!
//! - **With `tracing-integration`**: the `tracing` macros are re-exported
//!   unchanged.
//! - **Without it**: each macro expands to nothing, so stream operations pay
//!   nothing for their log statements.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::tracing_compat::{debug, trace};
//!
//! trace!(bytes = data.len(), "memory send");
//! debug!(scope = %cx.id(), "forced close interrupted at checkpoint");
//! ```
//!
//! Arguments are not evaluated when the feature is off. A value computed only
//! for logging should be computed inside the macro call.
//!
//! # Feature Flag
//!
//! ```toml
//! asupersync-streams = { version = "0.1", features = ["tracing-integration"] }
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! Macros that discard their input.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;

//! Optional tracing integration.
//!
//! With the `tracing-integration` feature (on by default) the logging macros
//! used throughout the crate are the `tracing` crate's own. Without it they
//! expand to nothing, so call sites never need their own `cfg` gates.
//!
//! Field syntax follows `tracing` (`key = value`, `%display`, `?debug`).

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    macro_rules! trace {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! debug {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! info {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! warn_ {
        ($($arg:tt)*) => {{}};
    }
    macro_rules! error {
        ($($arg:tt)*) => {{}};
    }

    pub(crate) use {debug, error, info, trace, warn_ as warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub(crate) use noop::{debug, error, info, trace, warn};

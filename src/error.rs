use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort plugin installation. These surface to the embedding harness
/// as an install failure; nothing past `init` should ever see one of these.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to connect trace sender to {path}: {source}")]
    Sender {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to initialize logging at {path}: {source}")]
    Logging {
        path: String,
        #[source]
        source: fern::InitError,
    },
}

/// Runtime errors that are logged and swallowed; they never propagate out of a host
/// callback. Kept as a type (rather than bare `log::warn!` calls everywhere) so the
/// handful of "this should not happen" paths stay documented in one place.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("syscall return on vcpu {vcpu} had num={got}, expected num={expected} from enter")]
    SyscallNumMismatch {
        vcpu: u32,
        expected: i64,
        got: i64,
    },

    #[error("syscall return on vcpu {vcpu} with no matching enter")]
    SyscallReturnWithoutEnter { vcpu: u32 },
}

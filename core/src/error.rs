use std::time::Duration;
use thiserror::Error;

/// Structural failures while building the index. Empty queries and queries
/// without candidates are not errors; they produce an empty result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The corpus key does not match the pid stored in the document.
    #[error("corpus key {key:?} does not match document pid {pid:?}")]
    PidMismatch { key: String, pid: String },

    /// A document was supplied with an empty pid.
    #[error("document with empty pid")]
    EmptyPid,

    /// The build ran past its configured deadline; nothing was published.
    #[error("index build took {elapsed:?}, exceeding deadline of {deadline:?}")]
    BuildTimeout { elapsed: Duration, deadline: Duration },
}

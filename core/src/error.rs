use thiserror::Error;

/// Errors surfaced by the parser, planner, and sc.exe invocations.
///
/// Every variant propagates to the immediate caller. Nothing in this crate
/// retries or partially applies an update; a failed update leaves observed
/// state exactly as the next query reports it.
#[derive(Debug, Error)]
pub enum ScError {
    /// The query target does not exist (`OpenService FAILED` in the report).
    #[error("service {0} does not exist")]
    ServiceNotFound(String),

    /// A line matched a numeric pattern but the capture is not an integer.
    #[error("malformed {field} in sc output: {value:?}")]
    Malformed {
        /// Record field the line was classified as.
        field: &'static str,
        /// Captured text that failed integer conversion.
        value: String,
    },

    /// sc.exe exited nonzero.
    #[error("sc.exe {verb} failed ({status}): {output}")]
    Invocation {
        /// First argument of the invocation (query, qfailure, failure).
        verb: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Merged stdout/stderr captured from the attempt, verbatim.
        output: String,
    },

    /// sc.exe could not be spawned at all.
    #[error("failed to run sc.exe: {0}")]
    Io(#[from] std::io::Error),
}

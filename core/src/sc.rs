use std::process::Command;

use crate::error::ScError;

/// Seam between this crate and the native service-control tool.
///
/// Everything above this trait works on captured text; implementations get
/// the full positional argument list as discrete elements and must never
/// join them into a shell string.
pub trait ScRunner {
    /// Invoke `sc.exe` with `args` and return its merged output on success.
    fn sc(&self, args: &[String]) -> Result<String, ScError>;
}

/// Production runner spawning `sc.exe` synchronously.
///
/// Each call blocks until the tool exits; there is no timeout, so bounding a
/// hung invocation is the caller's concern. stdout and stderr are captured
/// and merged in that order. A nonzero exit fails with the merged output
/// carried verbatim in the error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScExe;

impl ScRunner for ScExe {
    fn sc(&self, args: &[String]) -> Result<String, ScError> {
        let out = Command::new("sc.exe").args(args).output()?;
        let mut merged = String::from_utf8_lossy(&out.stdout).into_owned();
        merged.push_str(&String::from_utf8_lossy(&out.stderr));
        if !out.status.success() {
            return Err(ScError::Invocation {
                verb: args.first().cloned().unwrap_or_default(),
                status: out.status.to_string(),
                output: merged,
            });
        }
        Ok(merged)
    }
}

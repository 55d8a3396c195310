//! Bounded external command execution

use rg_sampler_core::TelemetryError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run `program` with `args` and return its stdout.
///
/// The child is killed if it has not exited within `timeout`. A non-zero
/// exit status is reported as `ToolFailed`.
pub async fn run_tool(
    program: &Path,
    args: &[&str],
    timeout: Duration,
) -> Result<String, TelemetryError> {
    let program_name = program.display().to_string();

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => {
            return Err(TelemetryError::ToolTimeout {
                program: program_name,
                timeout,
            })
        }
        Ok(Err(e)) => {
            return Err(TelemetryError::ToolFailed {
                program: program_name,
                reason: e.to_string(),
            })
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TelemetryError::ToolFailed {
            program: program_name,
            reason: format!("{} ({})", output.status, stderr.trim()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `run_tool` for synchronous callers. The tool runs on a scoped thread with
/// its own current-thread runtime, so this also works from inside an async
/// context.
pub fn run_tool_blocking(
    program: &Path,
    args: &[&str],
    timeout: Duration,
) -> Result<String, TelemetryError> {
    std::thread::scope(|scope| {
        let worker = scope.spawn(|| {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| TelemetryError::Unavailable(format!("tool runtime ({})", e)))?;
            runtime.block_on(run_tool(program, args, timeout))
        });
        worker.join().unwrap_or_else(|_| {
            Err(TelemetryError::ToolFailed {
                program: program.display().to_string(),
                reason: "runner thread panicked".to_string(),
            })
        })
    })
}

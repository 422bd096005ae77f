use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use wait_timeout::ChildExt;

use crate::core::OsInfo;

pub mod cim;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Default)]
pub struct CommandRunOptions {
    pub env: Vec<(String, String)>,
}

pub fn run_command(cmd: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    run_command_with_options(cmd, args, timeout, &CommandRunOptions::default())
}

pub fn run_command_with_options(
    cmd: &str,
    args: &[&str],
    timeout: Duration,
    options: &CommandRunOptions,
) -> Result<CommandOutput> {
    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    for (k, v) in &options.env {
        command.env(k, v);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start process: {cmd}"))?;

    // Drain the pipes while waiting so a chatty child cannot block on a full buffer.
    let stdout_reader = child.stdout.take().map(|mut out| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = out.read_to_string(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = err.read_to_string(&mut buf);
            buf
        })
    });

    let status = match child
        .wait_timeout(timeout)
        .with_context(|| format!("failed to wait for process: {cmd}"))?
    {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("timed out after {timeout:?}: {cmd}"));
        }
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(CommandOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var_os("USERPROFILE").filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("neither HOME nor USERPROFILE is set"))
}

pub fn os_info(timeout: Duration) -> OsInfo {
    #[cfg(target_os = "windows")]
    {
        return crate::platform::windows::os_info(timeout);
    }

    #[cfg(not(target_os = "windows"))]
    {
        let _ = timeout;
        return OsInfo {
            name: "unknown".to_string(),
            version: "unknown".to_string(),
        };
    }
}

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn run_command_captures_stdout_and_exit_code() {
        let out = run_command("sh", &["-c", "echo hello; exit 3"], Duration::from_secs(5))
            .expect("run sh");
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn run_command_passes_env() {
        let out = run_command_with_options(
            "sh",
            &["-c", "printf %s \"$AUDIODIAG_TEST_VALUE\""],
            Duration::from_secs(5),
            &CommandRunOptions {
                env: vec![("AUDIODIAG_TEST_VALUE".to_string(), "a'b".to_string())],
            },
        )
        .expect("run sh");
        assert_eq!(out.stdout, "a'b");
    }

    #[test]
    fn run_command_times_out() {
        let err = run_command("sh", &["-c", "sleep 5"], Duration::from_millis(100))
            .expect_err("should time out");
        assert!(err.to_string().contains("timed out"), "err={err}");
    }
}

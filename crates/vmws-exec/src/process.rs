//! Child-process runner shared by the `sh`, `cmd` and `ssh` shells.

use crate::output::ExecOutput;
use log::{debug, trace};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use vmws_core::{VmwsError, VmwsResult};

/// A program invocation with optional stdin payload.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Printable form for logs and errors.
    pub fn display(&self) -> String {
        let mut s = self.program.clone();
        for a in &self.args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }
}

/// Run to completion and capture both streams.
pub async fn run(inv: &Invocation, timeout: Option<Duration>) -> VmwsResult<ExecOutput> {
    let display = inv.display();
    debug!("exec: {}", display);

    let mut child = Command::new(&inv.program)
        .args(&inv.args)
        .stdin(if inv.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| VmwsError::exec_failed(&display, e.to_string()))?;

    if let Some(ref input) = inv.stdin {
        trace!("exec stdin: {}", input);
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| VmwsError::exec_failed(&display, e.to_string()))?;
            // Dropping the handle closes the pipe.
            drop(stdin);
        }
    }

    let waited = child.wait_with_output();
    let output = match timeout {
        Some(t) => tokio::time::timeout(t, waited)
            .await
            .map_err(|_| VmwsError::timeout(&display))?,
        None => waited.await,
    }
    .map_err(|e| VmwsError::exec_failed(&display, e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let exit_code = output.status.code().unwrap_or(-1);
    trace!(
        "exec exit={} stdout ({} bytes): {}",
        exit_code,
        stdout.len(),
        stdout.chars().take(300).collect::<String>()
    );
    if !stderr.is_empty() {
        trace!("exec stderr: {}", stderr.chars().take(500).collect::<String>());
    }

    Ok(ExecOutput::from_raw(&stdout, &stderr, exit_code))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_streams_and_exit_code() {
        let inv = Invocation::new(
            "sh",
            vec!["-c".into(), "echo out; echo err >&2; exit 3".into()],
        );
        let out = run(&inv, None).await.unwrap();
        assert_eq!(out.stdout, vec!["out"]);
        assert_eq!(out.stderr, vec!["err"]);
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn feeds_stdin() {
        let inv = Invocation::new("sh", vec![]).with_stdin("echo from-stdin\n");
        let out = run(&inv, None).await.unwrap();
        assert_eq!(out.stdout, vec!["from-stdin"]);
    }

    #[tokio::test]
    async fn missing_program_is_exec_failure() {
        let inv = Invocation::new("/nonexistent/vmws-test-binary", vec![]);
        let err = run(&inv, None).await.unwrap_err();
        assert!(err.is(&vmws_core::VmwsErrorKind::RemoteExecFailed));
    }
}

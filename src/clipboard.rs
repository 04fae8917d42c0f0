//! Best-effort copy to the system clipboard via the platform's CLI tool.

use std::io::Write;
use std::process::{Command, Stdio};

#[cfg(target_os = "windows")]
const CANDIDATES: &[(&str, &[&str])] = &[("clip", &[])];

#[cfg(target_os = "macos")]
const CANDIDATES: &[(&str, &[&str])] = &[("pbcopy", &[])];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CANDIDATES: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Copy `text` to the clipboard. Returns whether any tool accepted it.
pub fn copy(text: &str) -> bool {
    CANDIDATES
        .iter()
        .any(|(program, args)| pipe_into(program, args, text).unwrap_or(false))
}

fn pipe_into(program: &str, args: &[&str], text: &str) -> std::io::Result<bool> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // stdin is dropped before waiting so the tool sees EOF; the child is
    // reaped even when the write failed.
    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()),
        None => Ok(()),
    };
    let status = child.wait()?;
    written?;

    let ok = status.success();
    if !ok {
        tracing::debug!(program, "clipboard tool exited with failure");
    }
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn tool_exit_status_is_reported() {
        assert!(pipe_into("cat", &[], "hello").unwrap());
        assert!(!pipe_into("false", &[], "").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn broken_pipe_is_reported() {
        // `true` exits without reading, so a large write hits a broken pipe.
        let text = "x".repeat(1 << 20);
        assert!(pipe_into("true", &[], &text).is_err());
    }

    #[test]
    fn missing_tool_is_an_error() {
        assert!(pipe_into("definitely-not-a-clipboard-tool", &[], "x").is_err());
    }
}

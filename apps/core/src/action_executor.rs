use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("empty command")]
    EmptyCommand,
    #[error("unterminated quote in command: {0}")]
    UnterminatedQuote(String),
    #[error("failed to start '{program}': {message}")]
    Spawn { program: String, message: String },
}

/// Starts `program` without waiting for it. The child is reaped on a background
/// thread; its exit status is never reported to the caller.
pub fn launch_detached(program: &str, args: &[String]) -> Result<(), LaunchError> {
    let program = program.trim();
    if program.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|error| LaunchError::Spawn {
            program: program.to_string(),
            message: error.to_string(),
        })?;

    debug!(program, pid = child.id(), "launched detached process");
    let label = program.to_string();
    std::thread::spawn(move || {
        if let Err(error) = child.wait() {
            warn!(program = %label, %error, "failed to reap detached process");
        }
    });
    Ok(())
}

/// Runs `command` through `/bin/sh -c` (or `cmd /C` on Windows), detached.
pub fn run_shell_detached(command: &str) -> Result<(), LaunchError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    #[cfg(target_os = "windows")]
    {
        launch_detached("cmd", &["/C".to_string(), trimmed.to_string()])
    }

    #[cfg(not(target_os = "windows"))]
    {
        launch_detached("/bin/sh", &["-c".to_string(), trimmed.to_string()])
    }
}

/// Splits a command line into program and arguments, honouring single quotes,
/// double quotes and backslash escapes.
pub fn split_command(input: &str) -> Result<Vec<String>, LaunchError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return Err(LaunchError::UnterminatedQuote(input.to_string())),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => {
                                return Err(LaunchError::UnterminatedQuote(input.to_string()))
                            }
                        },
                        Some(inner) => current.push(inner),
                        None => return Err(LaunchError::UnterminatedQuote(input.to_string())),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Launches the program named by a command line such as a desktop entry `Exec` value.
pub fn launch_command_line(command_line: &str) -> Result<(), LaunchError> {
    let mut parts = split_command(command_line)?;
    if parts.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }
    let program = parts.remove(0);
    launch_detached(&program, &parts)
}

/// Hands a URL to the desktop's default opener.
pub fn open_url(url: &str) -> Result<(), LaunchError> {
    let target = url.trim();
    if target.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    #[cfg(target_os = "windows")]
    {
        launch_detached(
            "cmd",
            &[
                "/C".to_string(),
                "start".to_string(),
                String::new(),
                target.to_string(),
            ],
        )
    }

    #[cfg(target_os = "macos")]
    {
        launch_detached("open", &[target.to_string()])
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        launch_detached("xdg-open", &[target.to_string()])
    }
}

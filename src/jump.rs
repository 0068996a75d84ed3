use std::{
    env,
    ffi::{OsStr, OsString},
    process::{Command, ExitStatus, Stdio},
};

use log::{debug, info};
use thiserror::Error;

use crate::model::LocalRepository;

/// Set in the spawned shell to the repository path relative to its root.
pub const LOOK_ENV: &str = "REPOGET_LOOK";

#[derive(Error, Debug)]
pub enum JumpError {
    #[error("Could not start shell {shell}: {error}")]
    Spawn { shell: String, error: std::io::Error },
    #[error("Shell exited with {0}")]
    Exit(ExitStatus),
}

/// `$SHELL`, then `%COMSPEC%` on Windows, then `/bin/sh`.
pub fn detect_shell() -> OsString {
    if let Some(shell) = env::var_os("SHELL").filter(|shell| !shell.is_empty()) {
        return shell;
    }
    if cfg!(windows) {
        env::var_os("COMSPEC").unwrap_or_else(|| OsString::from("cmd.exe"))
    } else {
        OsString::from("/bin/sh")
    }
}

pub fn jump(repository: &LocalRepository) -> Result<(), JumpError> {
    jump_with_shell(&detect_shell(), repository)
}

/// Runs `shell` interactively inside `repository` and waits for it to exit.
pub fn jump_with_shell(shell: &OsStr, repository: &LocalRepository) -> Result<(), JumpError> {
    info!("Entering {}", repository.full_path().display());
    debug!("Starting {}", shell.to_string_lossy());

    let status = Command::new(shell)
        .current_dir(repository.full_path())
        .env(LOOK_ENV, repository.slash_path())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|error| JumpError::Spawn {
            shell: shell.to_string_lossy().into_owned(),
            error,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(JumpError::Exit(status))
    }
}

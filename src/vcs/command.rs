use std::{
    ffi::OsString,
    path::Path,
    process::{Command, ExitStatus, Stdio},
};

use log::{log, trace, warn};
use thiserror::Error;

use super::CloneOptions;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Could not run {program}: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },
    #[error("`{command}` failed with {status}")]
    Failed { command: String, status: ExitStatus },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

pub(super) fn mercurial(
    url: &str,
    destination: &Path,
    options: &CloneOptions,
) -> Result<(), CommandError> {
    if destination.exists() {
        if !options.update {
            return skip(destination, options);
        }
        log!(options.log_level(), "Updating {}", destination.display());
        let update: &[&str] = if options.bare {
            &["pull"]
        } else {
            &["pull", "--update"]
        };
        return run("hg", args(update), Some(destination), options.silent);
    }

    log!(
        options.log_level(),
        "Cloning {} into {}",
        url,
        destination.display()
    );
    create_parent(destination)?;
    let mut clone = args(&["clone"]);
    if let Some(branch) = &options.branch {
        clone.push("--branch".into());
        clone.push(branch.into());
    }
    if options.bare {
        clone.push("--noupdate".into());
    }
    clone.push(url.strip_prefix("hg+").unwrap_or(url).into());
    clone.push(destination.into());
    run("hg", clone, None, options.silent)
}

pub(super) fn subversion(
    url: &str,
    destination: &Path,
    options: &CloneOptions,
) -> Result<(), CommandError> {
    if options.bare {
        warn!("Subversion has no bare checkouts, ignoring --bare");
    }
    if destination.exists() {
        if !options.update {
            return skip(destination, options);
        }
        log!(options.log_level(), "Updating {}", destination.display());
        return run("svn", args(&["update"]), Some(destination), options.silent);
    }

    log!(
        options.log_level(),
        "Checking out {} into {}",
        url,
        destination.display()
    );
    create_parent(destination)?;
    let mut checkout = args(&["checkout"]);
    if options.shallow {
        checkout.push("--depth".into());
        checkout.push("immediates".into());
    }
    let url = match &options.branch {
        Some(branch) => format!("{}/branches/{}", url.trim_end_matches('/'), branch),
        None => url.to_owned(),
    };
    checkout.push(url.into());
    checkout.push(destination.into());
    run("svn", checkout, None, options.silent)
}

fn skip(destination: &Path, options: &CloneOptions) -> Result<(), CommandError> {
    log!(
        options.log_level(),
        "Skipping {}, it already exists",
        destination.display()
    );
    Ok(())
}

fn create_parent(destination: &Path) -> Result<(), CommandError> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

fn run(
    program: &str,
    args: Vec<OsString>,
    current_dir: Option<&Path>,
    silent: bool,
) -> Result<(), CommandError> {
    let command_line = std::iter::once(program.to_owned())
        .chain(args.iter().map(|arg| arg.to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");
    trace!("Running {}", command_line);

    let mut command = Command::new(program);
    command.args(&args).stdin(Stdio::null());
    if let Some(dir) = current_dir {
        command.current_dir(dir);
    }
    if silent {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let status = command.status().map_err(|error| CommandError::Spawn {
        program: program.to_owned(),
        error,
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Failed {
            command: command_line,
            status,
        })
    }
}

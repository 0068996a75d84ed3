mod command;
pub mod git;

use std::{fmt::Display, path::Path, str::FromStr};

use thiserror::Error;

use crate::model::RemoteUrl;

pub use command::CommandError;
pub use git::{GitClient, GitError};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown VCS `{0}`, expected one of git, hg, svn")]
pub struct UnknownVcs(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsKind {
    Git,
    Mercurial,
    Subversion,
}

impl VcsKind {
    /// Picks a client from the URL scheme, git unless the scheme says otherwise.
    pub fn infer(url: &RemoteUrl) -> VcsKind {
        match url.scheme() {
            "svn" | "svn+ssh" => VcsKind::Subversion,
            scheme if scheme == "hg" || scheme.starts_with("hg+") => VcsKind::Mercurial,
            _ => VcsKind::Git,
        }
    }
}

impl FromStr for VcsKind {
    type Err = UnknownVcs;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "git" | "github" => Ok(VcsKind::Git),
            "hg" | "mercurial" => Ok(VcsKind::Mercurial),
            "svn" | "subversion" => Ok(VcsKind::Subversion),
            _ => Err(UnknownVcs(value.to_owned())),
        }
    }
}

impl Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            VcsKind::Git => f.write_str("git"),
            VcsKind::Mercurial => f.write_str("hg"),
            VcsKind::Subversion => f.write_str("svn"),
        }
    }
}

/// Everything a client needs to know to clone or update one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOptions {
    pub vcs: VcsKind,
    pub update: bool,
    pub shallow: bool,
    pub branch: Option<String>,
    pub recursive: bool,
    pub bare: bool,
    pub silent: bool,
}

impl CloneOptions {
    /// Progress goes to `info` normally and to `debug` for silent fetches.
    pub(crate) fn log_level(&self) -> log::Level {
        if self.silent {
            log::Level::Debug
        } else {
            log::Level::Info
        }
    }
}

/// Clones `url` into `destination`, or updates it when it is already there.
///
/// Implementations must be idempotent when `options.update` is set and the
/// destination already holds a clone.
pub trait VcsClient: Send + Sync {
    fn clone_or_update(
        &self,
        url: &RemoteUrl,
        destination: &Path,
        options: &CloneOptions,
    ) -> anyhow::Result<()>;
}

/// Dispatches to libgit2 for git and to the `hg` / `svn` executables.
#[derive(Debug, Default)]
pub struct SystemVcs {
    git: GitClient,
}

impl VcsClient for SystemVcs {
    fn clone_or_update(
        &self,
        url: &RemoteUrl,
        destination: &Path,
        options: &CloneOptions,
    ) -> anyhow::Result<()> {
        match options.vcs {
            VcsKind::Git => self.git.clone_or_update(url.as_str(), destination, options)?,
            VcsKind::Mercurial => command::mercurial(url.as_str(), destination, options)?,
            VcsKind::Subversion => command::subversion(url.as_str(), destination, options)?,
        }
        Ok(())
    }
}

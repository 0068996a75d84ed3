use std::{fmt::Display, path::Path, sync::OnceLock};

use log::trace;
use regex_lite::Regex;
use thiserror::Error;
use url::Url;

use crate::{model::LocalRepository, vcs::VcsKind};

pub const DEFAULT_HOST: &str = "github.com";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlError {
    #[error("Empty repository name")]
    Empty,
    #[error("Invalid url {url}: {reason}")]
    Invalid { url: String, reason: String },
    #[error("Url {0} has no host")]
    MissingHost(String),
    #[error("Url {0} has no repository path")]
    MissingPath(String),
    #[error("Cannot expand {0} without a user, set github.user or REPOGET_GIT_USER")]
    MissingUser(String),
}

/// A remote repository URL together with the segments that decide where it
/// lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    url: Url,
    host: String,
    path_parts: Vec<String>,
}

impl RemoteUrl {
    fn parse(url: &str, target: &str) -> Result<RemoteUrl, UrlError> {
        let url = Url::parse(url).map_err(|error| UrlError::Invalid {
            url: target.to_owned(),
            reason: error.to_string(),
        })?;
        Self::from_url(url, target)
    }

    fn from_url(url: Url, target: &str) -> Result<RemoteUrl, UrlError> {
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| UrlError::MissingHost(target.to_owned()))?;

        let mut path_parts: Vec<String> = url
            .path()
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .map(str::to_owned)
            .collect();
        if let Some(last) = path_parts.last_mut() {
            if let Some(stripped) = last.strip_suffix(".git") {
                *last = stripped.to_owned();
            }
        }
        path_parts.retain(|part| !part.is_empty());
        if path_parts.is_empty() {
            return Err(UrlError::MissingPath(target.to_owned()));
        }

        Ok(RemoteUrl {
            url,
            host,
            path_parts,
        })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path_parts(&self) -> &[String] {
        &self.path_parts
    }

    /// Where this remote is cloned to below `root`. Bare clones get a `.git`
    /// suffix on the last segment.
    pub fn local_repository(&self, root: &Path, bare: bool) -> LocalRepository {
        let mut parts = Vec::with_capacity(self.path_parts.len() + 1);
        parts.push(self.host.clone());
        parts.extend(self.path_parts.iter().cloned());
        if bare {
            if let Some(last) = parts.last_mut() {
                last.push_str(".git");
            }
        }
        LocalRepository::from_parts(root, parts)
    }

    fn into_ssh(self) -> Result<RemoteUrl, UrlError> {
        match self.url.scheme() {
            "http" | "https" | "git" => {
                let ssh = format!("ssh://git@{}/{}.git", self.host, self.path_parts.join("/"));
                trace!("Rewriting {} to {}", self.url, ssh);
                Self::parse(&ssh, self.url.as_str())
            }
            _ => Ok(self),
        }
    }
}

impl Display for RemoteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Turns user supplied targets into remote URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    default_host: String,
    user: Option<String>,
}

impl Default for UrlResolver {
    fn default() -> Self {
        UrlResolver {
            default_host: DEFAULT_HOST.to_owned(),
            user: None,
        }
    }
}

impl UrlResolver {
    pub fn new(default_host: impl Into<String>, user: Option<String>) -> Self {
        UrlResolver {
            default_host: default_host.into(),
            user,
        }
    }

    /// Accepts full URLs, scp-like `user@host:path`, `host.tld/owner/repo`,
    /// `owner/repo` on the default host and a bare `repo` owned by the
    /// configured user.
    ///
    /// `ssh` rewrites http(s) and git URLs to ssh, unless `vcs` forces a
    /// client other than git.
    pub fn parse(
        &self,
        target: &str,
        ssh: bool,
        vcs: Option<VcsKind>,
    ) -> Result<RemoteUrl, UrlError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(UrlError::Empty);
        }

        let remote = if target.contains("://") {
            RemoteUrl::parse(target, target)?
        } else if let Some(captures) = scp_like().captures(target) {
            let user = captures.name("user").map_or("git", |m| m.as_str());
            let path = captures["path"].trim_start_matches('/');
            RemoteUrl::parse(&format!("ssh://{}@{}/{}", user, &captures["host"], path), target)?
        } else {
            let parts: Vec<&str> = target.split('/').filter(|p| !p.is_empty()).collect();
            let expanded = match parts.as_slice() {
                [] => return Err(UrlError::Empty),
                [repository] => {
                    let user = self
                        .user
                        .as_deref()
                        .ok_or_else(|| UrlError::MissingUser(target.to_owned()))?;
                    format!("https://{}/{}/{}", self.default_host, user, repository)
                }
                [host, _, ..] if host.contains('.') => format!("https://{}", parts.join("/")),
                _ => format!("https://{}/{}", self.default_host, parts.join("/")),
            };
            RemoteUrl::parse(&expanded, target)?
        };

        if ssh && matches!(vcs, None | Some(VcsKind::Git)) {
            remote.into_ssh()
        } else {
            Ok(remote)
        }
    }
}

fn scp_like() -> &'static Regex {
    static SCP_LIKE: OnceLock<Regex> = OnceLock::new();
    SCP_LIKE.get_or_init(|| {
        Regex::new(r"^(?:(?P<user>[^@/:\s]+)@)?(?P<host>[^@/:\s]{2,}):(?P<path>.+)$").unwrap()
    })
}

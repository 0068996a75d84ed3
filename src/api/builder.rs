use std::path::PathBuf;

use crate::{
    config::{Protocol, RepogetConfig},
    model::{UrlResolver, DEFAULT_HOST},
    Repoget,
};

#[derive(Default)]
pub struct RepogetBuilder {
    roots: Vec<PathBuf>,
    default_host: Option<String>,
    user: Option<String>,
    protocol: Option<Protocol>,
}

impl RepogetBuilder {
    /// Adds a root directory. The first root receives new clones, the others
    /// are only searched.
    ///
    /// Defaults to `REPOGET_ROOT`, then `repoget.root` from git config, then
    /// `$HOME/repoget`.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(path.into());
        self
    }

    /// Host used for `owner/repo` shorthands.
    ///
    /// Defaults to `github.com`.
    pub fn default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = Some(host.into());
        self
    }

    /// Owner used for bare `repo` names.
    ///
    /// Defaults to `github.user` from git config, then `$USER`.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// `Protocol::Ssh` makes every git fetch use ssh.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn try_build(self) -> anyhow::Result<Repoget> {
        let Self {
            roots,
            default_host,
            user,
            protocol,
        } = self;
        let config = RepogetConfig::load()?;

        let roots = if roots.is_empty() { config.roots } else { roots };
        let default_host = default_host
            .or(config.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let user = user.or(config.user);
        let protocol = protocol.or(config.protocol);

        Ok(Repoget::new(
            roots,
            UrlResolver::new(default_host, user),
            protocol == Some(Protocol::Ssh),
        ))
    }
}

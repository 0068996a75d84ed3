use std::{collections::HashMap, ffi::OsString, fmt::Display, path::PathBuf, str::FromStr};

use config::{Config, ConfigError, Environment};
use home::home_dir;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_ROOT_DIRECTORY: &str = "repoget";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown protocol `{0}`, expected https or ssh")]
pub struct InvalidProtocol(String);

#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Deserialize)]
pub enum Protocol {
    #[serde(rename = "https")]
    Https,
    #[serde(rename = "ssh")]
    Ssh,
}

impl FromStr for Protocol {
    type Err = InvalidProtocol;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "https" => Ok(Protocol::Https),
            "ssh" => Ok(Protocol::Ssh),
            _ => Err(InvalidProtocol(value.to_owned())),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Protocol::Https => f.write_str("https"),
            Protocol::Ssh => f.write_str("ssh"),
        }
    }
}

/// Settings resolved from the environment first and git configuration second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepogetConfig {
    pub roots: Vec<PathBuf>,
    pub protocol: Option<Protocol>,
    pub host: Option<String>,
    pub user: Option<String>,
}

impl RepogetConfig {
    pub fn load() -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(None)?;
        let git_config = GitSettings::load()?;
        Self::merge(raw_config, git_config)
    }

    fn merge(raw_config: RawConfig, git_config: GitSettings) -> anyhow::Result<Self> {
        let roots: Vec<PathBuf> = match raw_config.root {
            Some(roots) => std::env::split_paths(&OsString::from(roots))
                .filter(|root| !root.as_os_str().is_empty())
                .map(expand_home)
                .collect(),
            None => git_config.roots.into_iter().map(expand_home).collect(),
        };
        let roots = if roots.is_empty() {
            vec![default_root()?]
        } else {
            roots
        };

        let protocol = match raw_config.git.protocol {
            Some(protocol) => Some(protocol),
            None => git_config
                .protocol
                .as_deref()
                .map(Protocol::from_str)
                .transpose()?,
        };

        let user = raw_config
            .git
            .user
            .or(git_config.user)
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .filter(|user| !user.is_empty());

        Ok(Self {
            roots,
            protocol,
            host: raw_config.git.host.or(git_config.host),
            user,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    root: Option<String>,
    #[serde(default)]
    git: GitConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GitConfig {
    protocol: Option<Protocol>,
    host: Option<String>,
    user: Option<String>,
}

impl RawConfig {
    fn load(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix("REPOGET")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

/// Values read from the user's git configuration.
#[derive(Default, Debug, PartialEq, Eq)]
struct GitSettings {
    roots: Vec<PathBuf>,
    protocol: Option<String>,
    host: Option<String>,
    user: Option<String>,
}

impl GitSettings {
    fn load() -> Result<Self, git2::Error> {
        let config = match git2::Config::open_default() {
            Ok(config) => config,
            Err(error) => {
                debug!("No git configuration available: {}", error);
                return Ok(Self::default());
            }
        };
        Ok(Self {
            roots: multivar_paths(&config, "repoget.root")?,
            protocol: not_found_as_none(config.get_string("repoget.protocol"))?,
            host: not_found_as_none(config.get_string("repoget.host"))?,
            user: not_found_as_none(config.get_string("github.user"))?,
        })
    }
}

/// Every value of a multi-valued key, in the order git reads them.
fn multivar_paths(config: &git2::Config, name: &str) -> Result<Vec<PathBuf>, git2::Error> {
    let mut paths = Vec::new();
    let Some(mut entries) = not_found_as_none(config.multivar(name, None))? else {
        return Ok(paths);
    };
    while let Some(entry) = entries.next() {
        if let Some(value) = entry?.value().filter(|value| !value.is_empty()) {
            paths.push(PathBuf::from(value));
        }
    }
    Ok(paths)
}

fn not_found_as_none<T>(value: Result<T, git2::Error>) -> Result<Option<T>, git2::Error> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path,
    }
}

fn default_root() -> anyhow::Result<PathBuf> {
    let home = home_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not find home dir. Please define $HOME env variable.")
    })?;
    Ok(home.join(DEFAULT_ROOT_DIRECTORY))
}

use std::path::PathBuf;

use log::log;
use thiserror::Error;

use crate::{
    fetch::FetchMode,
    model::{LocalRepository, UrlResolver},
    vcs::{CloneOptions, VcsClient, VcsKind},
};

/// Settings shared by every fetch of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub update: bool,
    pub shallow: bool,
    pub ssh: bool,
    pub vcs: Option<VcsKind>,
    pub branch: Option<String>,
    pub recursive: bool,
    pub bare: bool,
    pub silent: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            update: false,
            shallow: false,
            ssh: false,
            vcs: None,
            branch: None,
            recursive: true,
            bare: false,
            silent: false,
        }
    }
}

impl FetchConfig {
    /// Parallel runs are always silent, their output would interleave.
    pub fn for_mode(mut self, mode: FetchMode) -> Self {
        if mode == FetchMode::Parallel {
            self.silent = true;
        }
        self
    }
}

#[derive(Error, Debug)]
#[error("failed to get {target:?}: {cause:#}")]
pub struct GetError {
    pub target: String,
    pub cause: anyhow::Error,
}

/// Fetches one target into the primary root.
pub struct Getter<C> {
    config: FetchConfig,
    resolver: UrlResolver,
    root: PathBuf,
    client: C,
}

impl<C: VcsClient> Getter<C> {
    pub fn new(config: FetchConfig, resolver: UrlResolver, root: PathBuf, client: C) -> Self {
        Getter {
            config,
            resolver,
            root,
            client,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn get(&self, target: &str) -> Result<LocalRepository, GetError> {
        self.try_get(target).map_err(|cause| GetError {
            target: target.to_owned(),
            cause,
        })
    }

    fn try_get(&self, target: &str) -> anyhow::Result<LocalRepository> {
        let url = self
            .resolver
            .parse(target, self.config.ssh, self.config.vcs)?;
        let repository = url.local_repository(&self.root, self.config.bare);
        let options = CloneOptions {
            vcs: self.config.vcs.unwrap_or_else(|| VcsKind::infer(&url)),
            update: self.config.update,
            shallow: self.config.shallow,
            branch: self.config.branch.clone(),
            recursive: self.config.recursive,
            bare: self.config.bare,
            silent: self.config.silent,
        };

        log!(
            options.log_level(),
            "Fetching {} ({}) into {}",
            url,
            options.vcs,
            repository.full_path().display()
        );
        self.client
            .clone_or_update(&url, repository.full_path(), &options)?;
        Ok(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{path::Path, sync::Mutex};

    use crate::model::RemoteUrl;
    use anyhow::bail;
    use pretty_assertions::assert_eq;

    /// Records every call and creates the destination directory, failing for
    /// targets whose URL contains `fail`.
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(String, PathBuf, CloneOptions)>>,
    }

    impl VcsClient for RecordingClient {
        fn clone_or_update(
            &self,
            url: &RemoteUrl,
            destination: &Path,
            options: &CloneOptions,
        ) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push((
                url.to_string(),
                destination.to_path_buf(),
                options.clone(),
            ));
            if url.as_str().contains("fail") {
                bail!("remote hung up");
            }
            if destination.exists() && !options.update {
                return Ok(());
            }
            std::fs::create_dir_all(destination)?;
            Ok(())
        }
    }

    fn getter(root: &Path, config: FetchConfig) -> Getter<RecordingClient> {
        Getter::new(
            config,
            UrlResolver::default(),
            root.to_path_buf(),
            RecordingClient::default(),
        )
    }

    #[test]
    fn get_forwards_options_and_returns_local_repository() {
        let root = tempfile::tempdir().unwrap();
        let config = FetchConfig {
            shallow: true,
            branch: Some("dev".to_owned()),
            ..FetchConfig::default()
        };
        let getter = getter(root.path(), config);

        let repo = getter.get("x/a").unwrap();
        assert_eq!(repo.slash_path(), "github.com/x/a");
        assert_eq!(repo.full_path(), root.path().join("github.com/x/a"));

        let calls = getter.client.calls.lock().unwrap();
        let (url, destination, options) = &calls[0];
        assert_eq!(url, "https://github.com/x/a");
        assert_eq!(destination, &root.path().join("github.com/x/a"));
        assert_eq!(
            options,
            &CloneOptions {
                vcs: VcsKind::Git,
                update: false,
                shallow: true,
                branch: Some("dev".to_owned()),
                recursive: true,
                bare: false,
                silent: false,
            }
        );
    }

    #[test]
    fn get_honours_vcs_override_and_bare() {
        let root = tempfile::tempdir().unwrap();
        let config = FetchConfig {
            vcs: Some(VcsKind::Mercurial),
            ssh: true,
            bare: true,
            ..FetchConfig::default()
        };
        let getter = getter(root.path(), config);

        let repo = getter.get("https://hg.example.org/x/a").unwrap();
        assert_eq!(repo.slash_path(), "hg.example.org/x/a.git");

        let calls = getter.client.calls.lock().unwrap();
        assert_eq!(calls[0].0, "https://hg.example.org/x/a");
        assert_eq!(calls[0].2.vcs, VcsKind::Mercurial);
    }

    #[test]
    fn get_annotates_errors_with_target() {
        let root = tempfile::tempdir().unwrap();
        let getter = getter(root.path(), FetchConfig::default());

        let error = getter.get("x/fail").unwrap_err();
        assert_eq!(error.target, "x/fail");
        assert_eq!(error.to_string(), "failed to get \"x/fail\": remote hung up");

        let error = getter.get("").unwrap_err();
        assert_eq!(error.to_string(), "failed to get \"\": Empty repository name");
    }

    #[test]
    fn update_twice_leaves_one_repository() {
        let root = tempfile::tempdir().unwrap();
        let config = FetchConfig {
            update: true,
            ..FetchConfig::default()
        };
        let getter = getter(root.path(), config);

        let first = getter.get("x/a").unwrap();
        let second = getter.get("x/a").unwrap();
        assert_eq!(first, second);

        let owner = root.path().join("github.com/x");
        assert_eq!(std::fs::read_dir(owner).unwrap().count(), 1);
        assert_eq!(getter.client.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn parallel_mode_forces_silent() {
        let config = FetchConfig::default().for_mode(FetchMode::Parallel);
        assert!(config.silent);
        let config = FetchConfig::default().for_mode(FetchMode::Sequential);
        assert!(!config.silent);
    }
}

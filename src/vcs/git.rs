use std::path::{Path, PathBuf};

use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    cert::Cert,
    AutotagOption, BranchType, CertificateCheckStatus, Config, Cred, CredentialType, FetchOptions,
    RemoteCallbacks, Repository, SubmoduleUpdateOptions,
};
use home::home_dir;
use log::{debug, log, trace};
use ssh_key::{known_hosts::HostPatterns, KnownHosts};
use thiserror::Error;

use super::CloneOptions;

const GLOBAL_KNOWN_HOSTS: &str = "/etc/ssh/ssh_known_hosts";

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
    #[error("Branch {branch} cannot be fast-forwarded to its upstream")]
    NotFastForward { branch: String },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Git client backed by libgit2.
#[derive(Debug, Clone)]
pub struct GitClient {
    known_hosts: Vec<PathBuf>,
}

impl Default for GitClient {
    fn default() -> Self {
        let mut known_hosts = Vec::new();
        if let Some(home) = home_dir() {
            known_hosts.push(home.join(".ssh").join("known_hosts"));
        }
        known_hosts.push(PathBuf::from(GLOBAL_KNOWN_HOSTS));
        GitClient { known_hosts }
    }
}

impl GitClient {
    pub fn clone_or_update(
        &self,
        url: &str,
        destination: &Path,
        options: &CloneOptions,
    ) -> Result<(), GitError> {
        if destination.exists() {
            if options.update {
                self.update(destination, options)
            } else {
                log!(
                    options.log_level(),
                    "Skipping {}, it already exists",
                    destination.display()
                );
                Ok(())
            }
        } else {
            self.clone(url, destination, options)
        }
    }

    fn clone(&self, url: &str, destination: &Path, options: &CloneOptions) -> Result<(), GitError> {
        log!(
            options.log_level(),
            "Cloning {} into {}",
            url,
            destination.display()
        );
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config = open_config()?;
        let mut fetch_options = self.fetch_options(&config);
        if options.shallow {
            fetch_options.depth(1);
        }

        let mut builder = RepoBuilder::new();
        builder.bare(options.bare).fetch_options(fetch_options);
        if let Some(branch) = &options.branch {
            builder.branch(branch);
        }
        let repo = builder.clone(url, destination)?;

        if options.recursive && !options.bare {
            self.update_submodules(&repo, &config)?;
        }
        Ok(())
    }

    fn update(&self, destination: &Path, options: &CloneOptions) -> Result<(), GitError> {
        log!(options.log_level(), "Updating {}", destination.display());
        let repo = Repository::open(destination)?;
        let config = open_config()?;

        {
            let mut remote = repo.find_remote("origin")?;
            let refspecs: Vec<String> = remote
                .refspecs()
                .filter_map(|refspec| refspec.str().map(|s| s.to_string()))
                .collect();
            remote.fetch(&refspecs, Some(&mut self.fetch_options(&config)), None)?;
        }

        if repo.is_bare() {
            return Ok(());
        }
        fast_forward(&repo)?;
        if options.recursive {
            self.update_submodules(&repo, &config)?;
        }
        Ok(())
    }

    fn update_submodules(&self, repo: &Repository, config: &Config) -> Result<(), GitError> {
        for mut submodule in repo.submodules()? {
            trace!("Updating submodule {}", submodule.path().display());
            let mut update_options = SubmoduleUpdateOptions::new();
            update_options.fetch(self.fetch_options(config));
            submodule.update(true, Some(&mut update_options))?;
            let nested = submodule.open()?;
            self.update_submodules(&nested, config)?;
        }
        Ok(())
    }

    fn fetch_options<'a>(&'a self, config: &'a Config) -> FetchOptions<'a> {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username, allowed_types| {
            trace!(
                "Requested credentials for {}, username {:?}, allowed types {:?}",
                url,
                username,
                allowed_types
            );
            // scp-like and ssh:// targets without a user fall back to `git`
            let user = username.unwrap_or("git");
            if allowed_types.contains(CredentialType::USERNAME) {
                return Cred::username(user);
            }
            if allowed_types.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(user);
            }
            // https: whatever credential.helper the user configured
            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                return Cred::credential_helper(config, url, username);
            }
            Err(git2::Error::from_str(&format!(
                "no supported authentication for {url}, allowed {allowed_types:?}"
            )))
        });

        callbacks.certificate_check(|certificate, host| self.check_certificate(certificate, host));

        let mut fetch_options = FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .download_tags(AutotagOption::Auto);
        fetch_options
    }

    fn check_certificate(
        &self,
        certificate: &Cert<'_>,
        host: &str,
    ) -> Result<CertificateCheckStatus, git2::Error> {
        let Some(hostkey) = certificate.as_hostkey().and_then(|h| h.hostkey()) else {
            return Ok(CertificateCheckStatus::CertificatePassthrough);
        };
        for path in &self.known_hosts {
            let entries = match KnownHosts::read_file(path) {
                Ok(entries) => entries,
                Err(error) => {
                    trace!("Could not load {}: {}", path.display(), error);
                    continue;
                }
            };
            for entry in entries {
                if host_matches_patterns(host, entry.host_patterns())
                    && entry.public_key().to_bytes().as_deref() == Ok(hostkey)
                {
                    trace!("Known host entry in {} matches {}", path.display(), host);
                    return Ok(CertificateCheckStatus::CertificateOk);
                }
            }
        }
        trace!("No known host entry matched the host key of {}", host);
        Ok(CertificateCheckStatus::CertificatePassthrough)
    }
}

fn open_config() -> Result<Config, GitError> {
    let config = Config::open_default().or_else(|error| {
        debug!("Falling back to an empty git config: {}", error);
        Config::new()
    })?;
    Ok(config)
}

/// Moves the checked out branch to its upstream, like `git pull --ff-only`.
fn fast_forward(repo: &Repository) -> Result<(), GitError> {
    let head = repo.head()?;
    if !head.is_branch() {
        debug!("HEAD is detached, leaving the working tree as is");
        return Ok(());
    }
    let Some(reference_name) = head.name().map(str::to_owned) else {
        return Ok(());
    };
    let branch_name = head.shorthand().unwrap_or(&reference_name).to_owned();

    let branch = repo.find_branch(&branch_name, BranchType::Local)?;
    let upstream = match branch.upstream() {
        Ok(upstream) => upstream,
        Err(error) if error.code() == git2::ErrorCode::NotFound => {
            debug!("Branch {} has no upstream", branch_name);
            return Ok(());
        }
        Err(error) => return Err(error.into()),
    };
    let Some(target) = upstream.get().target() else {
        return Ok(());
    };

    let annotated = repo.find_annotated_commit(target)?;
    let (analysis, _) = repo.merge_analysis(&[&annotated])?;
    if analysis.is_up_to_date() {
        trace!("Branch {} is up to date", branch_name);
        return Ok(());
    }
    if !analysis.is_fast_forward() {
        return Err(GitError::NotFastForward {
            branch: branch_name,
        });
    }

    let mut reference = repo.find_reference(&reference_name)?;
    reference.set_target(target, "repoget: fast-forward")?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    Ok(())
}

/// A negated pattern that matches rejects the host even when another pattern
/// accepts it.
fn host_matches_patterns(host: &str, patterns: &HostPatterns) -> bool {
    let HostPatterns::Patterns(patterns) = patterns else {
        // Hashed entries would need an HMAC of the host name
        return false;
    };
    let host = host.to_ascii_lowercase();
    let mut accepted = false;
    for pattern in patterns {
        let pattern = pattern.to_ascii_lowercase();
        match pattern.strip_prefix('!') {
            Some(negated) if wildcard_match(negated, &host) => return false,
            Some(_) => {}
            None => accepted |= wildcard_match(&pattern, &host),
        }
    }
    accepted
}

/// known_hosts wildcards: `*` spans any run of characters, `?` exactly one.
fn wildcard_match(pattern: &str, host: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let host: Vec<char> = host.chars().collect();
    let (mut p, mut h) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while h < host.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, h));
                p += 1;
            }
            Some(&c) if c == '?' || c == host[h] => {
                p += 1;
                h += 1;
            }
            _ => match backtrack {
                // let the last star swallow one more character
                Some((star, start)) => {
                    backtrack = Some((star, start + 1));
                    p = star + 1;
                    h = start + 1;
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

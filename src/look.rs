use std::{
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use log::debug;
use thiserror::Error;

use crate::{
    model::{LocalRepository, UrlResolver},
    walk::{RepositoryWalker, WalkError},
};

#[derive(Error, Debug)]
pub enum LookError {
    #[error("no repository found")]
    NotFound,
    #[error("{}", ambiguity_message(.0))]
    Ambiguous(Vec<String>),
    #[error(transparent)]
    Walk(#[from] WalkError),
}

fn ambiguity_message(candidates: &[String]) -> String {
    let mut message = String::from("More than one repositories are found; Try more precise name\n");
    for candidate in candidates {
        message.push_str("       - ");
        message.push_str(candidate);
        message.push('\n');
    }
    message
}

/// Resolves a partial repository name to exactly one local repository.
pub struct Locator<'a, W> {
    walker: &'a W,
    resolver: &'a UrlResolver,
    roots: &'a [PathBuf],
}

impl<'a, W: RepositoryWalker> Locator<'a, W> {
    pub fn new(walker: &'a W, resolver: &'a UrlResolver, roots: &'a [PathBuf]) -> Self {
        Locator {
            walker,
            resolver,
            roots,
        }
    }

    /// Every local repository `name` matches, in enumeration order.
    pub fn matches(&self, name: &str) -> Result<Vec<LocalRepository>, LookError> {
        let found = Mutex::new(Vec::new());
        self.walker.walk_all(&|repository: LocalRepository| {
            if repository.matches(name) {
                found
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(repository);
            }
        })?;
        Ok(found.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn locate(&self, name: &str, bare: bool) -> Result<LocalRepository, LookError> {
        let mut found = self.matches(name)?;
        if found.is_empty() {
            found.extend(self.existing_clone_of(name, bare));
        }

        match found.len() {
            0 => Err(LookError::NotFound),
            1 => Ok(found.remove(0)),
            _ => Err(LookError::Ambiguous(
                found.iter().map(LocalRepository::slash_path).collect(),
            )),
        }
    }

    /// Reads `name` as a remote URL and returns its clone if one exists on disk.
    fn existing_clone_of(&self, name: &str, bare: bool) -> Option<LocalRepository> {
        let url = match self.resolver.parse(name, false, None) {
            Ok(url) => url,
            Err(error) => {
                debug!("{} is not a remote url: {}", name, error);
                return None;
            }
        };
        self.roots
            .iter()
            .map(|root| url.local_repository(root, bare))
            .find(|repository| repository.full_path().exists())
    }
}

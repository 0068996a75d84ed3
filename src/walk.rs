use std::path::{Path, PathBuf};

use log::{trace, warn};
use thiserror::Error;
use walkdir::WalkDir;

use crate::model::LocalRepository;

/// Entries that mark a directory as a working copy.
const VCS_MARKERS: &[&str] = &[".git", ".hg", ".svn", "_darcs", ".bzr"];

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Could not walk root {root}: {error}")]
    Root { root: String, error: walkdir::Error },
    #[error("Walking {0} panicked")]
    Panicked(String),
}

/// Enumerates repositories on disk.
///
/// `callback` may be invoked from several threads at once.
pub trait RepositoryWalker {
    fn walk_all(&self, callback: &(dyn Fn(LocalRepository) + Sync)) -> Result<(), WalkError>;
}

/// Walks each root on its own thread.
#[derive(Debug, Clone)]
pub struct RootWalker {
    roots: Vec<PathBuf>,
}

impl RootWalker {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        RootWalker { roots }
    }
}

impl RepositoryWalker for RootWalker {
    fn walk_all(&self, callback: &(dyn Fn(LocalRepository) + Sync)) -> Result<(), WalkError> {
        std::thread::scope(|scope| {
            let walkers: Vec<_> = self
                .roots
                .iter()
                .map(|root| (root, scope.spawn(move || walk_root(root, callback))))
                .collect();
            walkers.into_iter().try_for_each(|(root, walker)| {
                walker
                    .join()
                    .unwrap_or_else(|_| Err(WalkError::Panicked(root.display().to_string())))
            })
        })
    }
}

fn walk_root(root: &Path, callback: &(dyn Fn(LocalRepository) + Sync)) -> Result<(), WalkError> {
    if !root.is_dir() {
        trace!("Root {} does not exist, skipping", root.display());
        return Ok(());
    }

    let mut entries = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => {
                return Err(WalkError::Root {
                    root: root.display().to_string(),
                    error,
                })
            }
            Err(error) => {
                warn!("Skipping unreadable entry: {}", error);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            entries.skip_current_dir();
            continue;
        }
        if is_repository(entry.path()) {
            match LocalRepository::from_full_path(root, entry.path()) {
                Ok(repository) => callback(repository),
                Err(error) => warn!("Skipping {}: {}", entry.path().display(), error),
            }
            entries.skip_current_dir();
        }
    }
    Ok(())
}

fn is_repository(path: &Path) -> bool {
    VCS_MARKERS.iter().any(|marker| path.join(marker).exists()) || is_bare_git(path)
}

fn is_bare_git(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "git")
        && path.join("HEAD").is_file()
        && path.join("objects").is_dir()
}

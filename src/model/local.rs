use std::{
    fmt::Display,
    path::{Component, Path, PathBuf},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocalPathError {
    #[error("Path {path} is not under the root {root}")]
    OutsideRoot { path: String, root: String },
    #[error("Path {0} contains a component that is not valid UTF-8")]
    NonUtf8(String),
    #[error("Path {0} does not name a repository below its root")]
    Empty(String),
}

/// A repository on disk, located below one of the managed roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    full_path: PathBuf,
    rel_path: PathBuf,
    path_parts: Vec<String>,
}

impl LocalRepository {
    /// Rebuilds a repository from an existing directory below `root`.
    pub fn from_full_path(root: &Path, full_path: &Path) -> Result<Self, LocalPathError> {
        let rel_path = full_path
            .strip_prefix(root)
            .map_err(|_| LocalPathError::OutsideRoot {
                path: full_path.display().to_string(),
                root: root.display().to_string(),
            })?;

        let mut path_parts = Vec::new();
        for component in rel_path.components() {
            if let Component::Normal(part) = component {
                let part = part
                    .to_str()
                    .ok_or_else(|| LocalPathError::NonUtf8(full_path.display().to_string()))?;
                path_parts.push(part.to_owned());
            }
        }
        if path_parts.is_empty() {
            return Err(LocalPathError::Empty(full_path.display().to_string()));
        }

        Ok(LocalRepository {
            full_path: full_path.to_path_buf(),
            rel_path: rel_path.to_path_buf(),
            path_parts,
        })
    }

    /// Projects a repository below `root` from its path segments.
    pub fn from_parts(root: &Path, path_parts: Vec<String>) -> Self {
        let rel_path: PathBuf = path_parts.iter().collect();
        LocalRepository {
            full_path: root.join(&rel_path),
            rel_path,
            path_parts,
        }
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    pub fn path_parts(&self) -> &[String] {
        &self.path_parts
    }

    /// Relative path joined with `/` whatever the host separator is.
    pub fn slash_path(&self) -> String {
        self.path_parts.join("/")
    }

    /// Whether `query` names this repository.
    ///
    /// The query is split into segments (both `/` and `\` separate) and must
    /// equal a contiguous run of whole segments of the relative path, so `a`
    /// matches `github.com/x/a` but not `github.com/x/ab`. A trailing `.git`
    /// is ignored on both sides so bare clones match by their plain name.
    pub fn matches(&self, query: &str) -> bool {
        let mut query: Vec<&str> = query
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .collect();
        if let Some(last) = query.last_mut() {
            *last = strip_git_suffix(last);
        }
        if query.is_empty() || query.len() > self.path_parts.len() {
            return false;
        }

        let last = self.path_parts.len() - 1;
        let parts: Vec<&str> = self
            .path_parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                if index == last {
                    strip_git_suffix(part)
                } else {
                    part.as_str()
                }
            })
            .collect();

        parts.windows(query.len()).any(|window| window == query.as_slice())
    }
}

impl Display for LocalRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.slash_path())
    }
}

fn strip_git_suffix(part: &str) -> &str {
    match part.strip_suffix(".git") {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => part,
    }
}
